use crate::auth::Scope;
use crate::domains::core::repository::{FindById, HardDeletable};
use crate::domains::participant::filter::{FilterExpr, FilterOperator, FilterTarget, FilterValue};
use crate::domains::participant::types::{
    Address, AddressAttributes, DateOfBirth, DateOfBirthAttributes, Email, EmailAttributes, Name,
    NameAttributes, NestedWrite, Participant, ParticipantRow, Phone, PhoneAttributes, RecordNumber,
    RecordNumberAttributes, Selector, SubRecordKind,
};
use crate::errors::{DbError, DomainError, DomainResult};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{query, query_scalar, FromRow, QueryBuilder, Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;

/// Trait defining participant repository operations
#[async_trait]
pub trait ParticipantRepository: FindById<Participant> + HardDeletable + Send + Sync {
    /// Resolve a selector within a scope, ordered by internal id ascending
    async fn find_in_scope(&self, scope: Scope, selector: &Selector) -> DomainResult<Vec<Participant>>;

    /// Insert an empty participant row and return its store-assigned id
    async fn insert_with_tx<'t>(&self, tx: &mut Transaction<'t, Sqlite>) -> DomainResult<i64>;

    /// Store the external id of a freshly inserted participant
    async fn assign_external_id_with_tx<'t>(
        &self,
        id: i64,
        external_id: &str,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<()>;

    /// Replace every sub-record kind named by `writes`
    async fn apply_nested_with_tx<'t>(
        &self,
        participant_id: i64,
        writes: &[NestedWrite],
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<()>;

    /// Bump `updated_at`. Fails with `EntityNotFound` when the row is gone.
    async fn touch_with_tx<'t>(&self, id: i64, tx: &mut Transaction<'t, Sqlite>) -> DomainResult<()>;

    /// Internal id of the participant with `external_id` in scope, read through the transaction
    async fn find_id_in_scope_with_tx<'t>(
        &self,
        scope: Scope,
        external_id: &str,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Option<i64>>;
}

/// SQLite implementation for ParticipantRepository
#[derive(Debug, Clone)]
pub struct SqliteParticipantRepository {
    pool: SqlitePool,
}

/// Participant ids bound per child query, well under SQLite's bound parameter limit
const CHILD_BATCH_SIZE: usize = 500;

const PARTICIPANT_COLUMNS: &str =
    "SELECT participants.id, participants.external_id, participants.created_at, participants.updated_at FROM participants";

fn write_error(error: sqlx::Error) -> DomainError {
    DomainError::from(DbError::from(error)).into_rejection()
}

fn group_by_participant<T>(rows: Vec<T>, key: impl Fn(&T) -> i64) -> HashMap<i64, Vec<T>> {
    let mut grouped: HashMap<i64, Vec<T>> = HashMap::new();
    for row in rows {
        grouped.entry(key(&row)).or_default().push(row);
    }
    grouped
}

fn push_scope(builder: &mut QueryBuilder<'_, Sqlite>, scope: Scope) {
    if let Scope::Project(project_id) = scope {
        builder.push(
            " AND EXISTS (SELECT 1 FROM project_participants pp WHERE pp.participant_id = participants.id AND pp.project_id = ",
        );
        builder.push_bind(project_id);
        builder.push(")");
    }
}

/// Append `<op> ?` for an already pushed left-hand side
fn push_comparison(builder: &mut QueryBuilder<'_, Sqlite>, filter: &FilterExpr) {
    if let Some(pattern) = filter.like_pattern() {
        builder.push(" LIKE ");
        builder.push_bind(pattern);
        builder.push(" ESCAPE '\\'");
        return;
    }

    builder.push(match filter.operator {
        FilterOperator::NotEq => " IS NOT ",
        _ => " = ",
    });
    match &filter.value {
        FilterValue::Text(text) => builder.push_bind(text.clone()),
        FilterValue::Flag(flag) => builder.push_bind(*flag),
    };
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &FilterExpr) {
    match filter.target {
        FilterTarget::ExternalId => {
            builder.push(" AND participants.external_id");
            push_comparison(builder, filter);
        }
        FilterTarget::Association { kind, column, .. } => {
            builder.push(" AND EXISTS (SELECT 1 FROM ");
            builder.push(kind.table());
            builder.push(" sub WHERE sub.participant_id = participants.id AND sub.\"");
            builder.push(column);
            builder.push("\"");
            push_comparison(builder, filter);
            builder.push(")");
        }
    }
}

fn quoted_columns(kind: SubRecordKind) -> String {
    kind.columns()
        .iter()
        .map(|(column, _)| format!("\"{}\"", column))
        .collect::<Vec<_>>()
        .join(", ")
}

impl SqliteParticipantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch the sub-records of one kind for the given participants,
    /// `CHILD_BATCH_SIZE` ids per query
    async fn fetch_children<T>(&self, kind: SubRecordKind, ids: &[i64]) -> DomainResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let columns = quoted_columns(kind);
        let mut rows = Vec::new();

        for chunk in ids.chunks(CHILD_BATCH_SIZE) {
            let mut builder = QueryBuilder::<Sqlite>::new("SELECT participant_id, ");
            builder.push(&columns);
            builder.push(" FROM ");
            builder.push(kind.table());
            builder.push(" WHERE participant_id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            builder.push(") ORDER BY id ASC");

            let batch = builder
                .build_query_as::<T>()
                .fetch_all(&self.pool)
                .await
                .map_err(DbError::from)?;
            rows.extend(batch);
        }

        Ok(rows)
    }

    /// Turn participant rows into entities with every sub-record attached
    async fn load(&self, rows: Vec<ParticipantRow>) -> DomainResult<Vec<Participant>> {
        let mut participants = rows
            .into_iter()
            .map(ParticipantRow::into_entity)
            .collect::<DomainResult<Vec<_>>>()?;
        if participants.is_empty() {
            return Ok(participants);
        }
        let ids: Vec<i64> = participants.iter().map(|p| p.id).collect();

        let mut names = group_by_participant(
            self.fetch_children::<Name>(SubRecordKind::Name, &ids).await?,
            |r| r.participant_id,
        );
        let mut dates = group_by_participant(
            self.fetch_children::<DateOfBirth>(SubRecordKind::DateOfBirth, &ids).await?,
            |r| r.participant_id,
        );
        let mut ssns = group_by_participant(
            self.fetch_children::<RecordNumber>(SubRecordKind::SocialSecurityNumber, &ids).await?,
            |r| r.participant_id,
        );
        let mut addresses = group_by_participant(
            self.fetch_children::<Address>(SubRecordKind::Address, &ids).await?,
            |r| r.participant_id,
        );
        let mut emails = group_by_participant(
            self.fetch_children::<Email>(SubRecordKind::Email, &ids).await?,
            |r| r.participant_id,
        );
        let mut phones = group_by_participant(
            self.fetch_children::<Phone>(SubRecordKind::Phone, &ids).await?,
            |r| r.participant_id,
        );
        let mut hib_numbers = group_by_participant(
            self.fetch_children::<RecordNumber>(SubRecordKind::HealthInsuranceBeneficiaryNumber, &ids)
                .await?,
            |r| r.participant_id,
        );
        let mut ip_numbers = group_by_participant(
            self.fetch_children::<RecordNumber>(SubRecordKind::IpAddressNumber, &ids).await?,
            |r| r.participant_id,
        );
        let mut mrns = group_by_participant(
            self.fetch_children::<RecordNumber>(SubRecordKind::MedicalRecordNumber, &ids).await?,
            |r| r.participant_id,
        );

        for p in participants.iter_mut() {
            p.name = names.remove(&p.id).and_then(|v| v.into_iter().next());
            p.date_of_birth = dates.remove(&p.id).and_then(|v| v.into_iter().next());
            p.social_security_number = ssns.remove(&p.id).and_then(|v| v.into_iter().next());
            p.addresses = addresses.remove(&p.id).unwrap_or_default();
            p.emails = emails.remove(&p.id).unwrap_or_default();
            p.phones = phones.remove(&p.id).unwrap_or_default();
            p.health_insurance_beneficiary_numbers = hib_numbers.remove(&p.id).unwrap_or_default();
            p.ip_address_numbers = ip_numbers.remove(&p.id).unwrap_or_default();
            p.medical_record_numbers = mrns.remove(&p.id).unwrap_or_default();
        }

        Ok(participants)
    }

    async fn insert_name<'t>(
        &self,
        participant_id: i64,
        name: &NameAttributes,
        now: &str,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<()> {
        query(
            "INSERT INTO names (participant_id, first_name, middle_name, last_name, prefix, suffix, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(participant_id)
        .bind(&name.first_name)
        .bind(&name.middle_name)
        .bind(&name.last_name)
        .bind(&name.prefix)
        .bind(&name.suffix)
        .bind(now)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(write_error)?;
        Ok(())
    }

    async fn insert_date_of_birth<'t>(
        &self,
        participant_id: i64,
        dob: &DateOfBirthAttributes,
        now: &str,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<()> {
        query(
            "INSERT INTO date_of_births (participant_id, date, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(participant_id)
        .bind(&dob.date)
        .bind(now)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(write_error)?;
        Ok(())
    }

    async fn insert_address<'t>(
        &self,
        participant_id: i64,
        address: &AddressAttributes,
        now: &str,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<()> {
        query(
            "INSERT INTO addresses (participant_id, name, street_1, street_2, city, state, zip, \"primary\", created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(participant_id)
        .bind(&address.name)
        .bind(&address.street_1)
        .bind(&address.street_2)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.zip)
        .bind(address.primary.unwrap_or(false))
        .bind(now)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(write_error)?;
        Ok(())
    }

    async fn insert_email<'t>(
        &self,
        participant_id: i64,
        email: &EmailAttributes,
        now: &str,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<()> {
        query("INSERT INTO emails (participant_id, email, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind(participant_id)
            .bind(&email.email)
            .bind(now)
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(write_error)?;
        Ok(())
    }

    async fn insert_phone<'t>(
        &self,
        participant_id: i64,
        phone: &PhoneAttributes,
        now: &str,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<()> {
        query(
            "INSERT INTO phones (participant_id, name, number, \"primary\", created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(participant_id)
        .bind(&phone.name)
        .bind(&phone.number)
        .bind(phone.primary.unwrap_or(false))
        .bind(now)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(write_error)?;
        Ok(())
    }

    /// Shared insert for the single-column identifier tables
    async fn insert_number<'t>(
        &self,
        kind: SubRecordKind,
        participant_id: i64,
        number: &RecordNumberAttributes,
        now: &str,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<()> {
        let mut builder = QueryBuilder::<Sqlite>::new("INSERT INTO ");
        builder.push(kind.table());
        builder.push(" (participant_id, number, created_at, updated_at) VALUES (");
        let mut separated = builder.separated(", ");
        separated.push_bind(participant_id);
        separated.push_bind(number.number.clone());
        separated.push_bind(now.to_string());
        separated.push_bind(now.to_string());
        builder.push(")");

        builder.build().execute(&mut **tx).await.map_err(write_error)?;
        Ok(())
    }

    async fn clear_kind<'t>(
        &self,
        kind: SubRecordKind,
        participant_id: i64,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<u64> {
        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM ");
        builder.push(kind.table());
        builder.push(" WHERE participant_id = ");
        builder.push_bind(participant_id);

        let result = builder.build().execute(&mut **tx).await.map_err(write_error)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl FindById<Participant> for SqliteParticipantRepository {
    async fn find_by_id(&self, id: i64) -> DomainResult<Participant> {
        self.find_in_scope(Scope::AllProjects, &Selector::ParticipantId(id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::EntityNotFound("Participant".to_string(), id.to_string()))
    }
}

#[async_trait]
impl HardDeletable for SqliteParticipantRepository {
    async fn hard_delete_with_tx(&self, id: i64, tx: &mut Transaction<'_, Sqlite>) -> DomainResult<()> {
        log::debug!("[PARTICIPANT_REPO] Hard deleting participant {}", id);

        let result = query("DELETE FROM participants WHERE id = ?")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(write_error)?;

        if result.rows_affected() == 0 {
            log::warn!("[PARTICIPANT_REPO] Hard delete failed - participant {} not found", id);
            Err(DomainError::EntityNotFound("Participant".to_string(), id.to_string()))
        } else {
            log::info!("[PARTICIPANT_REPO] Hard deleted participant {}", id);
            Ok(())
        }
    }
}

#[async_trait]
impl ParticipantRepository for SqliteParticipantRepository {
    async fn find_in_scope(&self, scope: Scope, selector: &Selector) -> DomainResult<Vec<Participant>> {
        let mut builder = QueryBuilder::<Sqlite>::new(PARTICIPANT_COLUMNS);
        builder.push(" WHERE participants.external_id IS NOT NULL");
        push_scope(&mut builder, scope);

        match selector {
            Selector::All => {}
            Selector::ExternalId(external_id) => {
                builder.push(" AND participants.external_id = ");
                builder.push_bind(external_id.clone());
            }
            Selector::ParticipantId(id) => {
                builder.push(" AND participants.id = ");
                builder.push_bind(*id);
            }
            Selector::Filters(filters) => {
                for filter in filters {
                    push_filter(&mut builder, filter);
                }
            }
        }
        builder.push(" ORDER BY participants.id ASC");

        let rows = builder
            .build_query_as::<ParticipantRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;

        log::debug!("[PARTICIPANT_REPO] {:?} in {:?} matched {} rows", selector, scope, rows.len());
        self.load(rows).await
    }

    async fn insert_with_tx<'t>(&self, tx: &mut Transaction<'t, Sqlite>) -> DomainResult<i64> {
        let now = Utc::now().to_rfc3339();
        let id = query_scalar::<_, i64>(
            "INSERT INTO participants (created_at, updated_at) VALUES (?, ?) RETURNING id",
        )
        .bind(&now)
        .bind(&now)
        .fetch_one(&mut **tx)
        .await
        .map_err(write_error)?;
        Ok(id)
    }

    async fn assign_external_id_with_tx<'t>(
        &self,
        id: i64,
        external_id: &str,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<()> {
        let result = query("UPDATE participants SET external_id = ? WHERE id = ? AND external_id IS NULL")
            .bind(external_id)
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(write_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::Internal(format!(
                "participant {} already has an external id",
                id
            )));
        }
        Ok(())
    }

    async fn apply_nested_with_tx<'t>(
        &self,
        participant_id: i64,
        writes: &[NestedWrite],
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();

        for write in writes {
            let kind = write.kind();
            let removed = self.clear_kind(kind, participant_id, tx).await?;

            match write {
                NestedWrite::Name(name) => {
                    if let Some(name) = name {
                        self.insert_name(participant_id, name, &now, tx).await?;
                    }
                }
                NestedWrite::DateOfBirth(dob) => {
                    if let Some(dob) = dob {
                        self.insert_date_of_birth(participant_id, dob, &now, tx).await?;
                    }
                }
                NestedWrite::SocialSecurityNumber(ssn) => {
                    if let Some(ssn) = ssn {
                        self.insert_number(kind, participant_id, ssn, &now, tx).await?;
                    }
                }
                NestedWrite::Addresses(addresses) => {
                    for address in addresses {
                        self.insert_address(participant_id, address, &now, tx).await?;
                    }
                }
                NestedWrite::Emails(emails) => {
                    for email in emails {
                        self.insert_email(participant_id, email, &now, tx).await?;
                    }
                }
                NestedWrite::Phones(phones) => {
                    for phone in phones {
                        self.insert_phone(participant_id, phone, &now, tx).await?;
                    }
                }
                NestedWrite::HealthInsuranceBeneficiaryNumbers(numbers)
                | NestedWrite::IpAddressNumbers(numbers)
                | NestedWrite::MedicalRecordNumbers(numbers) => {
                    for number in numbers {
                        self.insert_number(kind, participant_id, number, &now, tx).await?;
                    }
                }
            }

            log::debug!(
                "[PARTICIPANT_REPO] Replaced {} for participant {} ({} removed)",
                kind,
                participant_id,
                removed
            );
        }

        Ok(())
    }

    async fn touch_with_tx<'t>(&self, id: i64, tx: &mut Transaction<'t, Sqlite>) -> DomainResult<()> {
        let result = query("UPDATE participants SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(write_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::EntityNotFound("Participant".to_string(), id.to_string()));
        }
        Ok(())
    }

    async fn find_id_in_scope_with_tx<'t>(
        &self,
        scope: Scope,
        external_id: &str,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Option<i64>> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT participants.id FROM participants WHERE participants.external_id = ");
        builder.push_bind(external_id.to_string());
        push_scope(&mut builder, scope);

        let id = builder
            .build_query_scalar::<i64>()
            .fetch_optional(&mut **tx)
            .await
            .map_err(DbError::from)?;
        Ok(id)
    }
}
