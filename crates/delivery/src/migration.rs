use std::{collections::VecDeque, sync::Arc};

use {herald_registry::RegistryStore, tracing::info};

use crate::{Result, message::PendingMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub registry_rows: usize,
    pub pending_rewritten: usize,
}

/// Rewrites a moved destination's identifier in the registry and in the
/// not-yet-sent part of the current batch.
#[derive(Clone)]
pub struct MigrationResolver {
    registry: Arc<dyn RegistryStore>,
}

impl MigrationResolver {
    pub fn new(registry: Arc<dyn RegistryStore>) -> Self {
        Self { registry }
    }

    /// Apply `old_id → new_id`. Safe to repeat: a second call finds nothing
    /// left to rewrite and returns zero counts.
    ///
    /// The registry is updated first; `remaining` is only touched once the
    /// rename is committed.
    pub async fn resolve(
        &self,
        old_id: &str,
        new_id: &str,
        remaining: &mut VecDeque<PendingMessage>,
    ) -> Result<MigrationOutcome> {
        let registry_rows = self.registry.rename(old_id, new_id).await?;

        let mut pending_rewritten = 0;
        for message in remaining.iter_mut().filter(|m| m.destination_id == old_id) {
            message.destination_id = new_id.to_string();
            pending_rewritten += 1;
        }

        info!(
            old_destination_id = old_id,
            new_destination_id = new_id,
            registry_rows,
            pending_rewritten,
            "destination migrated"
        );
        Ok(MigrationOutcome {
            registry_rows,
            pending_rewritten,
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        herald_common::types::{DuplicatePolicy, Frequency, UniquenessMode},
        herald_registry::{InMemoryRegistry, Subscription},
    };

    #[tokio::test]
    async fn rewrites_registry_and_pending() {
        let registry = Arc::new(InMemoryRegistry::new(UniquenessMode::PerDestination));
        registry
            .upsert(
                &Subscription::new("old", "Deals", Frequency::Daily, "7"),
                DuplicatePolicy::Overwrite,
            )
            .await
            .unwrap();
        let resolver = MigrationResolver::new(registry.clone());

        let mut remaining: VecDeque<_> = vec![
            PendingMessage::new("old", "a"),
            PendingMessage::new("other", "b"),
            PendingMessage::new("old", "c"),
        ]
        .into();

        let outcome = resolver.resolve("old", "new", &mut remaining).await.unwrap();
        assert_eq!(outcome, MigrationOutcome {
            registry_rows: 1,
            pending_rewritten: 2
        });
        assert_eq!(remaining[0].destination_id, "new");
        assert_eq!(remaining[1].destination_id, "other");
        assert_eq!(remaining[2].destination_id, "new");
        assert!(registry.find("old").await.unwrap().is_none());
        assert_eq!(
            registry.find("new").await.unwrap().map(|s| s.destination_label),
            Some("Deals".to_string())
        );
    }

    #[tokio::test]
    async fn second_resolve_is_a_no_op() {
        let registry = Arc::new(InMemoryRegistry::with_rows(
            UniquenessMode::PerDestination,
            vec![Subscription::new("old", "", Frequency::Weekly, "3")],
        ));
        let resolver = MigrationResolver::new(registry);
        let mut remaining = VecDeque::new();

        resolver.resolve("old", "new", &mut remaining).await.unwrap();
        let again = resolver.resolve("old", "new", &mut remaining).await.unwrap();
        assert_eq!(again, MigrationOutcome {
            registry_rows: 0,
            pending_rewritten: 0
        });
    }
}
