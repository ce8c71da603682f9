//! SQLite-backed registry using sqlx.
//!
//! Each mutation runs in one transaction, so a crash mid-write rolls back to
//! the last committed table instead of relying on a file rename.

use std::path::Path;

use {
    async_trait::async_trait,
    herald_common::types::{DuplicatePolicy, UniquenessMode},
    sqlx::{
        Row, SqlitePool,
        sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    },
    tokio::sync::Mutex,
};

use crate::{
    Result,
    store::RegistryStore,
    types::{Subscription, UpsertOutcome},
};

pub struct SqliteRegistry {
    pool: SqlitePool,
    mode: UniquenessMode,
    write_lock: Mutex<()>,
}

impl SqliteRegistry {
    /// Connect to `database_url` with a dedicated pool and run migrations.
    pub async fn new(database_url: &str, mode: UniquenessMode) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        crate::run_migrations(&pool).await?;
        Ok(Self::with_pool(pool, mode))
    }

    /// Open (creating if missing) the database file at `path`.
    pub async fn open(path: &Path, mode: UniquenessMode) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        crate::run_migrations(&pool).await?;
        Ok(Self::with_pool(pool, mode))
    }

    /// Use an existing pool. [`crate::run_migrations`] must already have run.
    pub fn with_pool(pool: SqlitePool, mode: UniquenessMode) -> Self {
        Self {
            pool,
            mode,
            write_lock: Mutex::new(()),
        }
    }
}

fn row_to_subscription(row: &SqliteRow) -> Result<Subscription> {
    let frequency: String = row.try_get("frequency")?;
    Ok(Subscription {
        destination_id: row.try_get("destination_id")?,
        destination_label: row.try_get("destination_label")?,
        frequency: frequency.parse()?,
        source_id: row.try_get("source_id")?,
    })
}

#[async_trait]
impl RegistryStore for SqliteRegistry {
    fn mode(&self) -> UniquenessMode {
        self.mode
    }

    async fn upsert(
        &self,
        subscription: &Subscription,
        on_duplicate: DuplicatePolicy,
    ) -> Result<UpsertOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let existing = match self.mode {
            UniquenessMode::PerDestination => {
                sqlx::query(
                    "SELECT id, destination_id, destination_label, frequency, source_id
                     FROM subscriptions WHERE destination_id = ? ORDER BY id LIMIT 1",
                )
                .bind(&subscription.destination_id)
                .fetch_optional(&mut *tx)
                .await?
            },
            UniquenessMode::PerDestinationSource => {
                sqlx::query(
                    "SELECT id, destination_id, destination_label, frequency, source_id
                     FROM subscriptions WHERE destination_id = ? AND source_id = ?
                     ORDER BY id LIMIT 1",
                )
                .bind(&subscription.destination_id)
                .bind(&subscription.source_id)
                .fetch_optional(&mut *tx)
                .await?
            },
        };

        let Some(row) = existing else {
            sqlx::query(
                "INSERT INTO subscriptions (destination_id, destination_label, frequency, source_id)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&subscription.destination_id)
            .bind(&subscription.destination_label)
            .bind(subscription.frequency.as_str())
            .bind(&subscription.source_id)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            return Ok(UpsertOutcome::Created);
        };

        let id: i64 = row.try_get("id")?;
        let previous = row_to_subscription(&row)?;
        if on_duplicate == DuplicatePolicy::Reject {
            return Ok(UpsertOutcome::Rejected { existing: previous });
        }
        if previous == *subscription {
            return Ok(UpsertOutcome::Unchanged);
        }

        sqlx::query(
            "UPDATE subscriptions SET destination_label = ?, frequency = ?, source_id = ?
             WHERE id = ?",
        )
        .bind(&subscription.destination_label)
        .bind(subscription.frequency.as_str())
        .bind(&subscription.source_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(UpsertOutcome::Updated { previous })
    }

    async fn remove(&self, destination_id: &str) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM subscriptions WHERE destination_id = ?")
            .bind(destination_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn find_all(&self, destination_id: &str) -> Result<Vec<Subscription>> {
        let rows = sqlx::query(
            "SELECT destination_id, destination_label, frequency, source_id
             FROM subscriptions WHERE destination_id = ? ORDER BY id",
        )
        .bind(destination_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_subscription).collect()
    }

    async fn rename(&self, old_id: &str, new_id: &str) -> Result<usize> {
        if old_id == new_id {
            return Ok(0);
        }
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let sources: Vec<String> =
            sqlx::query("SELECT source_id FROM subscriptions WHERE destination_id = ?")
                .bind(old_id)
                .fetch_all(&mut *tx)
                .await?
                .iter()
                .map(|r| r.try_get("source_id"))
                .collect::<std::result::Result<_, _>>()?;
        if sources.is_empty() {
            return Ok(0);
        }

        // Clear rows under the new id that the migrated rows would collide with.
        match self.mode {
            UniquenessMode::PerDestination => {
                sqlx::query("DELETE FROM subscriptions WHERE destination_id = ?")
                    .bind(new_id)
                    .execute(&mut *tx)
                    .await?;
            },
            UniquenessMode::PerDestinationSource => {
                for source in &sources {
                    sqlx::query(
                        "DELETE FROM subscriptions WHERE destination_id = ? AND source_id = ?",
                    )
                    .bind(new_id)
                    .bind(source)
                    .execute(&mut *tx)
                    .await?;
                }
            },
        }

        let result =
            sqlx::query("UPDATE subscriptions SET destination_id = ? WHERE destination_id = ?")
                .bind(new_id)
                .bind(old_id)
                .execute(&mut *tx)
                .await?;
        tx.commit().await?;
        Ok(result.rows_affected() as usize)
    }

    async fn scan(&self) -> Result<Vec<Subscription>> {
        let rows = sqlx::query(
            "SELECT destination_id, destination_label, frequency, source_id
             FROM subscriptions ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_subscription).collect()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, herald_common::types::Frequency, tempfile::TempDir};

    async fn make_store(dir: &TempDir, mode: UniquenessMode) -> SqliteRegistry {
        SqliteRegistry::open(&dir.path().join("registry.db"), mode)
            .await
            .unwrap()
    }

    fn sub(dest: &str, freq: Frequency, source: &str) -> Subscription {
        Subscription::new(dest, "", freq, source)
    }

    #[tokio::test]
    async fn test_sqlite_upsert_updates_in_place() {
        let tmp = TempDir::new().unwrap();
        let store = make_store(&tmp, UniquenessMode::PerDestination).await;

        assert_eq!(
            store
                .upsert(&sub("g1", Frequency::Daily, "7"), DuplicatePolicy::Overwrite)
                .await
                .unwrap(),
            UpsertOutcome::Created
        );
        assert_eq!(
            store
                .upsert(&sub("g1", Frequency::Daily, "7"), DuplicatePolicy::Overwrite)
                .await
                .unwrap(),
            UpsertOutcome::Unchanged
        );
        store
            .upsert(&sub("g1", Frequency::Weekly, "7"), DuplicatePolicy::Overwrite)
            .await
            .unwrap();

        let rows = store.scan().await.unwrap();
        assert_eq!(rows, vec![sub("g1", Frequency::Weekly, "7")]);
    }

    #[tokio::test]
    async fn test_sqlite_rename_per_source_collisions() {
        let tmp = TempDir::new().unwrap();
        let store = make_store(&tmp, UniquenessMode::PerDestinationSource).await;
        for row in [
            sub("old", Frequency::Weekly, "7"),
            sub("old", Frequency::Weekly, "8"),
            sub("new", Frequency::Daily, "8"),
            sub("new", Frequency::Daily, "9"),
        ] {
            store.upsert(&row, DuplicatePolicy::Overwrite).await.unwrap();
        }

        assert_eq!(store.rename("old", "new").await.unwrap(), 2);
        assert!(store.find_all("old").await.unwrap().is_empty());
        let mut rows = store.find_all("new").await.unwrap();
        rows.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        assert_eq!(rows, vec![
            sub("new", Frequency::Weekly, "7"),
            sub("new", Frequency::Weekly, "8"),
            sub("new", Frequency::Daily, "9"),
        ]);
    }

    #[tokio::test]
    async fn test_sqlite_reject_policy() {
        let tmp = TempDir::new().unwrap();
        let store = make_store(&tmp, UniquenessMode::PerDestination).await;
        store
            .upsert(&sub("g1", Frequency::Daily, "7"), DuplicatePolicy::Reject)
            .await
            .unwrap();
        let outcome = store
            .upsert(&sub("g1", Frequency::Weekly, "7"), DuplicatePolicy::Reject)
            .await
            .unwrap();
        assert!(matches!(outcome, UpsertOutcome::Rejected { .. }));
        assert_eq!(
            store.find("g1").await.unwrap().map(|s| s.frequency),
            Some(Frequency::Daily)
        );
    }

    #[tokio::test]
    async fn test_sqlite_remove_and_find() {
        let tmp = TempDir::new().unwrap();
        let store = make_store(&tmp, UniquenessMode::PerDestinationSource).await;
        store
            .upsert(&sub("g1", Frequency::Daily, "7"), DuplicatePolicy::Overwrite)
            .await
            .unwrap();
        store
            .upsert(&sub("g1", Frequency::Daily, "8"), DuplicatePolicy::Overwrite)
            .await
            .unwrap();

        assert_eq!(store.remove("g1").await.unwrap(), 2);
        assert_eq!(store.remove("g1").await.unwrap(), 0);
        assert!(store.find("g1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_rename() {
        let tmp = TempDir::new().unwrap();
        let store = make_store(&tmp, UniquenessMode::PerDestination).await;
        store
            .upsert(&sub("old", Frequency::Manual, "4"), DuplicatePolicy::Overwrite)
            .await
            .unwrap();
        store
            .upsert(&sub("new", Frequency::Daily, "1"), DuplicatePolicy::Overwrite)
            .await
            .unwrap();

        assert_eq!(store.rename("old", "new").await.unwrap(), 1);
        assert_eq!(store.rename("old", "new").await.unwrap(), 0);
        assert_eq!(store.scan().await.unwrap(), vec![sub(
            "new",
            Frequency::Manual,
            "4"
        )]);
    }

    #[tokio::test]
    async fn test_sqlite_persists_across_pools() {
        let tmp = TempDir::new().unwrap();
        make_store(&tmp, UniquenessMode::PerDestination)
            .await
            .upsert(&sub("g1", Frequency::Daily, "7"), DuplicatePolicy::Overwrite)
            .await
            .unwrap();
        let reopened = make_store(&tmp, UniquenessMode::PerDestination).await;
        assert_eq!(reopened.scan().await.unwrap().len(), 1);
    }
}
