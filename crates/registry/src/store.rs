//! Persistence trait for the subscription registry.

use {
    async_trait::async_trait,
    herald_common::types::{DuplicatePolicy, UniquenessMode},
};

use crate::{
    Result,
    types::{Subscription, UpsertOutcome},
};

/// Durable table of subscriptions.
///
/// Implementations serialize all mutations (single writer) and only ever
/// expose fully committed tables to readers. Every returned row is a copy.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Uniqueness mode this store was opened with.
    fn mode(&self) -> UniquenessMode;

    /// Insert `subscription`, or resolve a key collision per `on_duplicate`.
    async fn upsert(
        &self,
        subscription: &Subscription,
        on_duplicate: DuplicatePolicy,
    ) -> Result<UpsertOutcome>;

    /// Delete every row of a destination. Returns how many were removed.
    async fn remove(&self, destination_id: &str) -> Result<usize>;

    /// First row of a destination, if any.
    async fn find(&self, destination_id: &str) -> Result<Option<Subscription>> {
        Ok(self.find_all(destination_id).await?.into_iter().next())
    }

    /// Every row of a destination.
    async fn find_all(&self, destination_id: &str) -> Result<Vec<Subscription>>;

    /// Rewrite every row of `old_id` to `new_id`. Returns the affected count.
    async fn rename(&self, old_id: &str, new_id: &str) -> Result<usize>;

    /// Full table.
    async fn scan(&self) -> Result<Vec<Subscription>>;

    /// The table in its persisted format, for operator download.
    async fn export(&self) -> Result<String> {
        crate::table::encode(&self.scan().await?)
    }
}
