use crate::auth::{AuthContext, Scope};
use crate::domains::core::identifier::IdentifierCodec;
use crate::domains::core::repository::{FindById, HardDeletable};
use crate::domains::participant::repository::ParticipantRepository;
use crate::domains::participant::types::{NestedWrite, Participant, ParticipantAttributes, Selector};
use crate::domains::project::repository::ProjectRepository;
use crate::errors::{DbError, DomainError, DomainResult, ServiceResult};
use crate::validation::Validate;
use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::sync::Arc;

/// Trait defining participant service operations
#[async_trait]
pub trait ParticipantService: Send + Sync {
    /// Every participant matching `selector` within the caller's scope
    async fn list_participants(
        &self,
        selector: Selector,
        auth: &AuthContext,
    ) -> ServiceResult<Vec<Participant>>;

    async fn get_participant(&self, external_id: &str, auth: &AuthContext) -> ServiceResult<Participant>;

    async fn create_participant(
        &self,
        attributes: ParticipantAttributes,
        auth: &AuthContext,
    ) -> ServiceResult<Participant>;

    async fn update_participant(
        &self,
        external_id: &str,
        attributes: ParticipantAttributes,
        auth: &AuthContext,
    ) -> ServiceResult<Participant>;

    async fn delete_participant(&self, external_id: &str, auth: &AuthContext) -> ServiceResult<()>;
}

/// Implementation of the participant service
#[derive(Clone)]
pub struct ParticipantServiceImpl {
    pool: SqlitePool,
    repo: Arc<dyn ParticipantRepository>,
    project_repo: Arc<dyn ProjectRepository>,
    codec: IdentifierCodec,
}

impl ParticipantServiceImpl {
    pub fn new(
        pool: SqlitePool,
        repo: Arc<dyn ParticipantRepository>,
        project_repo: Arc<dyn ProjectRepository>,
        codec: IdentifierCodec,
    ) -> Self {
        Self {
            pool,
            repo,
            project_repo,
            codec,
        }
    }

    fn not_found(external_id: &str) -> DomainError {
        DomainError::EntityNotFound("Participant".to_string(), external_id.to_string())
    }

    /// Repository lookups report internal ids; clients only know the external one
    fn with_external_id(external_id: &str, error: DomainError) -> DomainError {
        match error {
            DomainError::EntityNotFound(..) => Self::not_found(external_id),
            other => other,
        }
    }

    /// Look up one participant by external id within scope. Undecodable ids
    /// are indistinguishable from unknown ones.
    async fn resolve(&self, external_id: &str, scope: Scope) -> DomainResult<Participant> {
        if self.codec.decode(external_id).is_err() {
            log::debug!("[PARTICIPANT_SERVICE] '{}' is not a valid external id", external_id);
            return Err(Self::not_found(external_id));
        }

        self.repo
            .find_in_scope(scope, &Selector::ExternalId(external_id.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Self::not_found(external_id))
    }

    async fn create_with_tx<'t>(
        &self,
        scope: Scope,
        writes: &[NestedWrite],
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<(i64, String)> {
        let id = self.repo.insert_with_tx(tx).await?;
        let external_id = self.codec.encode(id)?;
        self.repo.assign_external_id_with_tx(id, &external_id, tx).await?;
        self.repo.apply_nested_with_tx(id, writes, tx).await?;

        if let Some(project_id) = scope.project_id() {
            self.project_repo.add_participant_with_tx(project_id, id, tx).await?;
        }
        Ok((id, external_id))
    }

    async fn update_with_tx<'t>(
        &self,
        id: i64,
        writes: &[NestedWrite],
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<()> {
        self.repo.touch_with_tx(id, tx).await?;
        self.repo.apply_nested_with_tx(id, writes, tx).await
    }

    async fn delete_with_tx<'t>(
        &self,
        external_id: &str,
        scope: Scope,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<()> {
        let id = self
            .repo
            .find_id_in_scope_with_tx(scope, external_id, tx)
            .await?
            .ok_or_else(|| Self::not_found(external_id))?;
        self.repo
            .hard_delete_with_tx(id, tx)
            .await
            .map_err(|e| Self::with_external_id(external_id, e))
    }
}

#[async_trait]
impl ParticipantService for ParticipantServiceImpl {
    async fn list_participants(
        &self,
        selector: Selector,
        auth: &AuthContext,
    ) -> ServiceResult<Vec<Participant>> {
        if let Selector::ExternalId(external_id) = &selector {
            if !self.codec.is_valid(external_id) {
                return Ok(Vec::new());
            }
        }

        let participants = self.repo.find_in_scope(auth.scope, &selector).await?;
        log::debug!(
            "[PARTICIPANT_SERVICE] {} listed {} participants",
            auth.subject,
            participants.len()
        );
        Ok(participants)
    }

    async fn get_participant(&self, external_id: &str, auth: &AuthContext) -> ServiceResult<Participant> {
        Ok(self.resolve(external_id, auth.scope).await?)
    }

    async fn create_participant(
        &self,
        attributes: ParticipantAttributes,
        auth: &AuthContext,
    ) -> ServiceResult<Participant> {
        attributes.validate()?;
        let writes = attributes.into_writes();

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        let (id, external_id) = match self.create_with_tx(auth.scope, &writes, &mut tx).await {
            Ok(created) => {
                tx.commit().await.map_err(DbError::from)?;
                created
            }
            Err(e) => {
                log::error!("[PARTICIPANT_SERVICE] Create transaction failed: {}", e);
                let _ = tx.rollback().await;
                return Err(e.into());
            }
        };

        let participant = self
            .repo
            .find_by_id(id)
            .await
            .map_err(|e| Self::with_external_id(&external_id, e))?;
        log::info!(
            "[PARTICIPANT_SERVICE] {} created participant {}",
            auth.subject,
            participant.external_id
        );
        Ok(participant)
    }

    async fn update_participant(
        &self,
        external_id: &str,
        attributes: ParticipantAttributes,
        auth: &AuthContext,
    ) -> ServiceResult<Participant> {
        let participant = self.resolve(external_id, auth.scope).await?;
        attributes.validate()?;

        let writes = attributes.into_writes();
        if writes.is_empty() {
            return Ok(participant);
        }

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        match self.update_with_tx(participant.id, &writes, &mut tx).await {
            Ok(()) => {
                tx.commit().await.map_err(DbError::from)?;
            }
            Err(e) => {
                log::error!("[PARTICIPANT_SERVICE] Update transaction failed for {}: {}", external_id, e);
                let _ = tx.rollback().await;
                return Err(Self::with_external_id(external_id, e).into());
            }
        }

        log::info!(
            "[PARTICIPANT_SERVICE] {} updated {} on participant {}",
            auth.subject,
            writes.iter().map(|w| w.kind().as_str()).collect::<Vec<_>>().join(", "),
            external_id
        );
        Ok(self
            .repo
            .find_by_id(participant.id)
            .await
            .map_err(|e| Self::with_external_id(external_id, e))?)
    }

    async fn delete_participant(&self, external_id: &str, auth: &AuthContext) -> ServiceResult<()> {
        if self.codec.decode(external_id).is_err() {
            return Err(Self::not_found(external_id).into());
        }

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        match self.delete_with_tx(external_id, auth.scope, &mut tx).await {
            Ok(()) => {
                tx.commit().await.map_err(DbError::from)?;
            }
            Err(e) => {
                let _ = tx.rollback().await;
                return Err(e.into());
            }
        }

        log::info!("[PARTICIPANT_SERVICE] {} deleted participant {}", auth.subject, external_id);
        Ok(())
    }
}
