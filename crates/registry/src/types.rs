use {
    herald_common::types::{DuplicatePolicy, Frequency, UniquenessMode},
    serde::{Deserialize, Serialize},
};

/// One registered interest of a destination in a content source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub destination_id: String,
    /// Advisory display name. Never part of a key.
    #[serde(default)]
    pub destination_label: String,
    pub frequency: Frequency,
    pub source_id: String,
}

impl Subscription {
    pub fn new(
        destination_id: impl Into<String>,
        destination_label: impl Into<String>,
        frequency: Frequency,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            destination_id: destination_id.into(),
            destination_label: destination_label.into(),
            frequency,
            source_id: source_id.into(),
        }
    }

    /// Whether `self` and `other` occupy the same key under `mode`.
    #[must_use]
    pub fn same_key(&self, other: &Subscription, mode: UniquenessMode) -> bool {
        if self.destination_id != other.destination_id {
            return false;
        }
        match mode {
            UniquenessMode::PerDestination => true,
            UniquenessMode::PerDestinationSource => self.source_id == other.source_id,
        }
    }
}

/// Result of [`crate::RegistryStore::upsert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated { previous: Subscription },
    /// An identical row already existed; nothing was written.
    Unchanged,
    /// The key existed and the duplicate policy is [`DuplicatePolicy::Reject`].
    Rejected { existing: Subscription },
}

impl UpsertOutcome {
    #[must_use]
    pub fn changed(&self) -> bool {
        matches!(self, Self::Created | Self::Updated { .. })
    }
}

// ── In-memory table operations ──────────────────────────────────────────────
//
// Shared by the file and memory backends: both load the whole table, apply
// one of these, and publish the result.

pub(crate) fn apply_upsert(
    rows: &mut Vec<Subscription>,
    subscription: &Subscription,
    mode: UniquenessMode,
    on_duplicate: DuplicatePolicy,
) -> UpsertOutcome {
    let Some(pos) = rows.iter().position(|r| r.same_key(subscription, mode)) else {
        rows.push(subscription.clone());
        return UpsertOutcome::Created;
    };

    if on_duplicate == DuplicatePolicy::Reject {
        return UpsertOutcome::Rejected {
            existing: rows[pos].clone(),
        };
    }
    if rows[pos] == *subscription {
        return UpsertOutcome::Unchanged;
    }
    let previous = std::mem::replace(&mut rows[pos], subscription.clone());
    UpsertOutcome::Updated { previous }
}

pub(crate) fn apply_remove(rows: &mut Vec<Subscription>, destination_id: &str) -> usize {
    let before = rows.len();
    rows.retain(|r| r.destination_id != destination_id);
    before - rows.len()
}

/// Move every row of `old_id` to `new_id`. A row already stored under
/// `new_id` with a colliding key is replaced by the migrated one.
pub(crate) fn apply_rename(
    rows: &mut Vec<Subscription>,
    old_id: &str,
    new_id: &str,
    mode: UniquenessMode,
) -> usize {
    if old_id == new_id {
        return 0;
    }
    let migrated: Vec<Subscription> = rows
        .iter()
        .filter(|r| r.destination_id == old_id)
        .map(|r| Subscription {
            destination_id: new_id.to_string(),
            ..r.clone()
        })
        .collect();
    if migrated.is_empty() {
        return 0;
    }
    rows.retain(|r| r.destination_id != old_id && !migrated.iter().any(|m| m.same_key(r, mode)));
    let count = migrated.len();
    rows.extend(migrated);
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(dest: &str, freq: Frequency, source: &str) -> Subscription {
        Subscription::new(dest, "", freq, source)
    }

    #[test]
    fn upsert_twice_keeps_one_row() {
        for policy in [DuplicatePolicy::Overwrite, DuplicatePolicy::Reject] {
            let mut rows = Vec::new();
            let s = sub("g1", Frequency::Daily, "7");
            assert_eq!(
                apply_upsert(&mut rows, &s, UniquenessMode::PerDestination, policy),
                UpsertOutcome::Created
            );
            let second = apply_upsert(&mut rows, &s, UniquenessMode::PerDestination, policy);
            assert!(!second.changed());
            assert_eq!(rows.len(), 1);
        }
    }

    #[test]
    fn overwrite_updates_in_place() {
        let mut rows = vec![sub("g1", Frequency::Daily, "7"), sub("g2", Frequency::Daily, "1")];
        let outcome = apply_upsert(
            &mut rows,
            &sub("g1", Frequency::Weekly, "7"),
            UniquenessMode::PerDestination,
            DuplicatePolicy::Overwrite,
        );
        assert_eq!(
            outcome,
            UpsertOutcome::Updated {
                previous: sub("g1", Frequency::Daily, "7")
            }
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].frequency, Frequency::Weekly);
    }

    #[test]
    fn reject_leaves_existing_row() {
        let mut rows = vec![sub("g1", Frequency::Daily, "7")];
        let outcome = apply_upsert(
            &mut rows,
            &sub("g1", Frequency::Weekly, "7"),
            UniquenessMode::PerDestination,
            DuplicatePolicy::Reject,
        );
        assert!(matches!(outcome, UpsertOutcome::Rejected { .. }));
        assert_eq!(rows[0].frequency, Frequency::Daily);
    }

    #[test]
    fn per_destination_source_allows_several_sources() {
        let mut rows = Vec::new();
        let mode = UniquenessMode::PerDestinationSource;
        apply_upsert(
            &mut rows,
            &sub("g1", Frequency::Daily, "7"),
            mode,
            DuplicatePolicy::Overwrite,
        );
        apply_upsert(
            &mut rows,
            &sub("g1", Frequency::Daily, "8"),
            mode,
            DuplicatePolicy::Overwrite,
        );
        assert_eq!(rows.len(), 2);

        // Same pair again updates rather than appends.
        apply_upsert(
            &mut rows,
            &sub("g1", Frequency::Weekly, "8"),
            mode,
            DuplicatePolicy::Overwrite,
        );
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn remove_counts_rows() {
        let mut rows = vec![
            sub("g1", Frequency::Daily, "7"),
            sub("g1", Frequency::Daily, "8"),
            sub("g2", Frequency::Daily, "7"),
        ];
        assert_eq!(apply_remove(&mut rows, "g1"), 2);
        assert_eq!(apply_remove(&mut rows, "g1"), 0);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn rename_moves_rows_and_is_idempotent() {
        let mut rows = vec![sub("old", Frequency::Weekly, "7"), sub("g2", Frequency::Daily, "1")];
        assert_eq!(
            apply_rename(&mut rows, "old", "new", UniquenessMode::PerDestination),
            1
        );
        assert_eq!(
            apply_rename(&mut rows, "old", "new", UniquenessMode::PerDestination),
            0
        );
        assert!(rows.iter().all(|r| r.destination_id != "old"));
        let moved = rows.iter().find(|r| r.destination_id == "new");
        assert_eq!(moved, Some(&sub("new", Frequency::Weekly, "7")));
    }

    #[test]
    fn rename_replaces_colliding_row() {
        let mut rows = vec![sub("old", Frequency::Weekly, "7"), sub("new", Frequency::Daily, "3")];
        apply_rename(&mut rows, "old", "new", UniquenessMode::PerDestination);
        assert_eq!(rows, vec![sub("new", Frequency::Weekly, "7")]);
    }

    #[test]
    fn rename_per_source_replaces_only_colliding_sources() {
        let mode = UniquenessMode::PerDestinationSource;
        let mut rows = vec![
            sub("old", Frequency::Weekly, "7"),
            sub("old", Frequency::Weekly, "8"),
            sub("new", Frequency::Daily, "8"),
            sub("new", Frequency::Daily, "9"),
        ];
        assert_eq!(apply_rename(&mut rows, "old", "new", mode), 2);

        let mut moved: Vec<_> = rows.iter().map(|r| (r.source_id.as_str(), r.frequency)).collect();
        moved.sort_by_key(|(source, _)| *source);
        assert_eq!(moved, vec![
            ("7", Frequency::Weekly),
            ("8", Frequency::Weekly),
            ("9", Frequency::Daily),
        ]);
        assert!(rows.iter().all(|r| r.destination_id == "new"));
    }
}
