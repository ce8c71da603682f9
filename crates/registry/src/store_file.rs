//! JSON-table file registry with atomic writes.
//!
//! Several herald processes may share one table, so mutations hold an
//! exclusive lock on `<table>.lock` for the whole read-modify-write.

use std::path::{Path, PathBuf};

use {
    async_trait::async_trait,
    herald_common::{
        file,
        types::{DuplicatePolicy, UniquenessMode},
    },
    tokio::sync::Mutex,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use herald_metrics::{gauge, registry as reg_metrics};

use crate::{
    Result,
    store::RegistryStore,
    table,
    types::{self, Subscription, UpsertOutcome},
};

/// File-backed registry. The whole table lives in one file that is replaced
/// atomically on every mutation.
pub struct FileRegistry {
    path: PathBuf,
    mode: UniquenessMode,
    /// Keeps this instance's writers off the blocking pool while another
    /// one holds the file lock.
    write_lock: Mutex<()>,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>, mode: UniquenessMode) -> Self {
        Self {
            path: path.into(),
            mode,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<Subscription>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_table(&path)).await?
    }

    /// Lock, load, apply `change`, and publish when it reports a change.
    async fn mutate<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Subscription>) -> (T, bool) + Send + 'static,
        T: Send + 'static,
    {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        let (value, published) = tokio::task::spawn_blocking(move || {
            file::with_exclusive_lock(&path, || -> Result<_> {
                let mut rows = read_table(&path)?;
                let (value, changed) = change(&mut rows);
                if !changed {
                    return Ok((value, None));
                }
                publish(&path, &rows)?;
                Ok((value, Some(rows.len())))
            })
        })
        .await??;

        if let Some(rows) = published {
            debug!(path = %self.path.display(), rows, "registry table published");
            #[cfg(feature = "metrics")]
            gauge!(reg_metrics::SUBSCRIPTIONS).set(rows as f64);
        }
        Ok(value)
    }
}

fn read_table(path: &Path) -> Result<Vec<Subscription>> {
    match file::read_optional(path)? {
        Some(raw) => table::decode(&raw),
        None => Ok(Vec::new()),
    }
}

/// Keep the current table as `.bak`, then swap the new one in.
fn publish(path: &Path, rows: &[Subscription]) -> Result<()> {
    let encoded = table::encode(rows)?;
    let bak = file::sidecar(path, "bak");
    match std::fs::copy(path, &bak) {
        Ok(_) => {},
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
        Err(e) => warn!(path = %bak.display(), error = %e, "failed to back up registry table"),
    }
    file::write_atomic(path, encoded.as_bytes())?;
    Ok(())
}

#[async_trait]
impl RegistryStore for FileRegistry {
    fn mode(&self) -> UniquenessMode {
        self.mode
    }

    async fn upsert(
        &self,
        subscription: &Subscription,
        on_duplicate: DuplicatePolicy,
    ) -> Result<UpsertOutcome> {
        let subscription = subscription.clone();
        let mode = self.mode;
        self.mutate(move |rows| {
            let outcome = types::apply_upsert(rows, &subscription, mode, on_duplicate);
            let changed = outcome.changed();
            (outcome, changed)
        })
        .await
    }

    async fn remove(&self, destination_id: &str) -> Result<usize> {
        let destination_id = destination_id.to_string();
        self.mutate(move |rows| {
            let removed = types::apply_remove(rows, &destination_id);
            (removed, removed > 0)
        })
        .await
    }

    async fn find_all(&self, destination_id: &str) -> Result<Vec<Subscription>> {
        Ok(self
            .load()
            .await?
            .into_iter()
            .filter(|r| r.destination_id == destination_id)
            .collect())
    }

    async fn rename(&self, old_id: &str, new_id: &str) -> Result<usize> {
        let (old_id, new_id) = (old_id.to_string(), new_id.to_string());
        let mode = self.mode;
        self.mutate(move |rows| {
            let renamed = types::apply_rename(rows, &old_id, &new_id, mode);
            (renamed, renamed > 0)
        })
        .await
    }

    async fn scan(&self) -> Result<Vec<Subscription>> {
        self.load().await
    }

    async fn export(&self) -> Result<String> {
        let path = self.path.clone();
        match tokio::task::spawn_blocking(move || file::read_optional(&path)).await?? {
            Some(raw) => Ok(raw),
            None => table::encode(&[]),
        }
    }
}
