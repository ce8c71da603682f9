//! In-memory registry for tests and dry runs.

use std::sync::Mutex;

use {
    async_trait::async_trait,
    herald_common::types::{DuplicatePolicy, UniquenessMode},
};

use crate::{
    Result,
    store::RegistryStore,
    types::{self, Subscription, UpsertOutcome},
};

/// In-memory registry backed by a `Vec`. No persistence.
pub struct InMemoryRegistry {
    mode: UniquenessMode,
    rows: Mutex<Vec<Subscription>>,
}

impl InMemoryRegistry {
    pub fn new(mode: UniquenessMode) -> Self {
        Self {
            mode,
            rows: Mutex::new(Vec::new()),
        }
    }

    /// Seed the registry with existing rows.
    pub fn with_rows(mode: UniquenessMode, rows: Vec<Subscription>) -> Self {
        Self {
            mode,
            rows: Mutex::new(rows),
        }
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new(UniquenessMode::default())
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistry {
    fn mode(&self) -> UniquenessMode {
        self.mode
    }

    async fn upsert(
        &self,
        subscription: &Subscription,
        on_duplicate: DuplicatePolicy,
    ) -> Result<UpsertOutcome> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(types::apply_upsert(
            &mut rows,
            subscription,
            self.mode,
            on_duplicate,
        ))
    }

    async fn remove(&self, destination_id: &str) -> Result<usize> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(types::apply_remove(&mut rows, destination_id))
    }

    async fn find_all(&self, destination_id: &str) -> Result<Vec<Subscription>> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows
            .iter()
            .filter(|r| r.destination_id == destination_id)
            .cloned()
            .collect())
    }

    async fn rename(&self, old_id: &str, new_id: &str) -> Result<usize> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(types::apply_rename(&mut rows, old_id, new_id, self.mode))
    }

    async fn scan(&self) -> Result<Vec<Subscription>> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows.clone())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, herald_common::types::Frequency};

    #[tokio::test]
    async fn find_all_in_per_source_mode() {
        let store = InMemoryRegistry::new(UniquenessMode::PerDestinationSource);
        for source in ["7", "8"] {
            store
                .upsert(
                    &Subscription::new("g1", "", Frequency::Daily, source),
                    DuplicatePolicy::Overwrite,
                )
                .await
                .unwrap();
        }
        assert_eq!(store.find_all("g1").await.unwrap().len(), 2);
        assert_eq!(
            store.find("g1").await.unwrap().map(|s| s.source_id),
            Some("7".to_string())
        );
        assert_eq!(store.remove("g1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn rename_per_source_merges_into_existing_destination() {
        let store = InMemoryRegistry::with_rows(UniquenessMode::PerDestinationSource, vec![
            Subscription::new("old", "", Frequency::Weekly, "7"),
            Subscription::new("old", "", Frequency::Weekly, "8"),
            Subscription::new("new", "", Frequency::Daily, "8"),
            Subscription::new("new", "", Frequency::Daily, "9"),
        ]);
        assert_eq!(store.rename("old", "new").await.unwrap(), 2);

        assert!(store.find_all("old").await.unwrap().is_empty());
        let mut rows = store.find_all("new").await.unwrap();
        rows.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        assert_eq!(rows, vec![
            Subscription::new("new", "", Frequency::Weekly, "7"),
            Subscription::new("new", "", Frequency::Weekly, "8"),
            Subscription::new("new", "", Frequency::Daily, "9"),
        ]);
    }

    #[tokio::test]
    async fn export_uses_table_format() {
        let store = InMemoryRegistry::with_rows(UniquenessMode::PerDestination, vec![
            Subscription::new("g1", "G", Frequency::Weekly, "2"),
        ]);
        let exported = store.export().await.unwrap();
        assert_eq!(
            crate::table::decode(&exported).unwrap(),
            store.scan().await.unwrap()
        );
    }
}
