use crate::errors::DomainResult;
use async_trait::async_trait;
use sqlx::{Sqlite, Transaction};

/// Trait for finding entities by their internal ID
#[async_trait]
pub trait FindById<T> {
    /// Find an entity by ID
    async fn find_by_id(&self, id: i64) -> DomainResult<T>;
}

/// Trait for entities that are removed outright rather than tombstoned
#[async_trait]
pub trait HardDeletable {
    /// Hard delete an entity by ID within a transaction
    async fn hard_delete_with_tx(
        &self,
        id: i64,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()>;
}
