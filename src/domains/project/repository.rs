use crate::domains::core::repository::FindById;
use crate::domains::project::types::{NewProject, Project, ProjectRow};
use crate::errors::{DbError, DomainError, DomainResult};
use crate::validation::Validate;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as, query_scalar, Sqlite, SqlitePool, Transaction};

/// Trait defining project repository operations
#[async_trait]
pub trait ProjectRepository: FindById<Project> + Send + Sync {
    async fn create(&self, new_project: &NewProject) -> DomainResult<Project>;

    /// Number of participants linked to the project
    async fn count_participants(&self, project_id: i64) -> DomainResult<i64>;

    /// Link a participant to a project inside the caller's transaction
    async fn add_participant_with_tx<'t>(
        &self,
        project_id: i64,
        participant_id: i64,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<()>;
}

/// SQLite implementation for ProjectRepository
#[derive(Debug, Clone)]
pub struct SqliteProjectRepository {
    pool: SqlitePool,
}

impl SqliteProjectRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FindById<Project> for SqliteProjectRepository {
    async fn find_by_id(&self, id: i64) -> DomainResult<Project> {
        let row = query_as::<_, ProjectRow>(
            "SELECT id, name, created_at, updated_at FROM projects WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?
        .ok_or_else(|| DomainError::EntityNotFound("Project".to_string(), id.to_string()))?;

        row.into_entity()
    }
}

#[async_trait]
impl ProjectRepository for SqliteProjectRepository {
    async fn create(&self, new_project: &NewProject) -> DomainResult<Project> {
        new_project.validate()?;

        let now = Utc::now().to_rfc3339();
        let id = query_scalar::<_, i64>(
            "INSERT INTO projects (name, created_at, updated_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&new_project.name)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;

        log::info!("[PROJECT_REPO] Created project {} ({})", id, new_project.name);
        self.find_by_id(id).await
    }

    async fn count_participants(&self, project_id: i64) -> DomainResult<i64> {
        let count = query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM project_participants WHERE project_id = ?",
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(count)
    }

    async fn add_participant_with_tx<'t>(
        &self,
        project_id: i64,
        participant_id: i64,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<()> {
        query(
            "INSERT OR IGNORE INTO project_participants (project_id, participant_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(project_id)
        .bind(participant_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut **tx)
        .await
        .map_err(|e| DomainError::from(DbError::from(e)).into_rejection())?;

        log::debug!("[PROJECT_REPO] Linked participant {} to project {}", participant_id, project_id);
        Ok(())
    }
}
