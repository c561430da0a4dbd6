use crate::errors::{DbError, DbResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

// Embed all migration SQL files at compile time
const MIGRATION_PARTICIPANTS: &str = include_str!("../migrations/20140623164946_create_participants.sql");
const MIGRATION_SUB_RECORDS: &str = include_str!("../migrations/20140714160216_create_sub_records.sql");

// List of migrations with their names and SQL content
const MIGRATIONS: &[(&str, &str)] = &[
    ("20140623164946_create_participants.sql", MIGRATION_PARTICIPANTS),
    ("20140714160216_create_sub_records.sql", MIGRATION_SUB_RECORDS),
];

/// Open a pool for `database_url`, creating the file if needed.
/// Foreign keys are enforced on every connection.
pub async fn connect_pool(database_url: &str, max_connections: u32) -> DbResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| DbError::Other(format!("Invalid database URL {}: {}", database_url, e)))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(DbError::from)?;

    log::info!("[DB_MIGRATION] Connected to {}", database_url);
    Ok(pool)
}

/// Apply every migration that has not been recorded yet
pub async fn initialize_database(pool: &SqlitePool) -> DbResult<()> {
    log::info!("[DB_MIGRATION] Starting database migration process");

    create_migrations_table(pool).await?;
    let last_migration = get_last_migration(pool).await?;

    match &last_migration {
        Some(name) => log::debug!("[DB_MIGRATION] Last applied migration: {}", name),
        None => log::debug!("[DB_MIGRATION] No migrations applied yet"),
    }

    apply_pending_migrations(pool, last_migration).await
}

/// Create migrations table if it doesn't exist
async fn create_migrations_table(pool: &SqlitePool) -> DbResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(|e| DbError::Migration(format!("Failed to create migrations table: {}", e)))?;

    Ok(())
}

/// Get the last applied migration
async fn get_last_migration(pool: &SqlitePool) -> DbResult<Option<String>> {
    let result = sqlx::query_scalar::<_, String>("SELECT name FROM migrations ORDER BY id DESC LIMIT 1")
        .fetch_optional(pool)
        .await
        .map_err(|e| DbError::Migration(format!("Failed to get last migration: {}", e)))?;

    Ok(result)
}

/// Apply pending migrations in a single transaction
async fn apply_pending_migrations(pool: &SqlitePool, last_migration: Option<String>) -> DbResult<()> {
    let pending_migrations = get_pending_migrations(last_migration.as_deref());

    if pending_migrations.is_empty() {
        log::info!("[DB_MIGRATION] No pending migrations to apply");
        return Ok(());
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| DbError::Transaction(format!("Failed to begin transaction: {}", e)))?;

    for (migration_name, migration_sql) in pending_migrations {
        log::info!("[DB_MIGRATION] Applying migration: {}", migration_name);

        sqlx::raw_sql(migration_sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::Migration(format!("Failed to apply migration {}: {}", migration_name, e)))?;

        sqlx::query("INSERT INTO migrations (name, applied_at) VALUES (?, ?)")
            .bind(migration_name)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::Migration(format!("Failed to record migration {}: {}", migration_name, e)))?;
    }

    tx.commit()
        .await
        .map_err(|e| DbError::Transaction(format!("Failed to commit migrations: {}", e)))?;

    log::info!("[DB_MIGRATION] All migrations applied and committed successfully");
    Ok(())
}

/// Determine which migrations need to be applied
fn get_pending_migrations(last_migration: Option<&str>) -> Vec<(&'static str, &'static str)> {
    let mut pending = Vec::new();
    let mut should_include = last_migration.is_none();

    for &(migration_name, migration_sql) in MIGRATIONS {
        if should_include {
            pending.push((migration_name, migration_sql));
        } else if Some(migration_name) == last_migration {
            // Found the last applied migration, include all subsequent ones
            should_include = true;
        }
    }

    pending
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_migrations_follow_last_applied() {
        assert_eq!(get_pending_migrations(None).len(), MIGRATIONS.len());
        assert_eq!(
            get_pending_migrations(Some("20140623164946_create_participants.sql"))
                .iter()
                .map(|(name, _)| *name)
                .collect::<Vec<_>>(),
            vec!["20140714160216_create_sub_records.sql"]
        );
        assert!(get_pending_migrations(Some("20140714160216_create_sub_records.sql")).is_empty());
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = connect_pool("sqlite::memory:", 1).await.unwrap();
        initialize_database(&pool).await.unwrap();
        initialize_database(&pool).await.unwrap();

        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('participants', 'emails', 'project_participants')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(tables, 3);
    }
}
