//! Pending-message queues consumed destructively by a delivery run.
//!
//! A run claims the whole queue up front. Messages appended while it is
//! sending land in a fresh queue and wait for the next run.

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use {
    async_trait::async_trait,
    herald_common::file,
    serde_json::Value,
    tracing::{debug, warn},
};

use crate::{
    error::{Context, Error, Result},
    message::PendingMessage,
};

/// Entries taken from a queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueBatch {
    pub messages: Vec<PendingMessage>,
    /// Entries dropped because they lacked a destination or a body.
    pub skipped: usize,
}

/// Source of pending messages for a run.
#[async_trait]
pub trait PendingQueue: Send + Sync {
    /// Claim every queued entry, leaving the queue empty for later appends.
    async fn take(&self) -> Result<QueueBatch>;

    /// Discard the batch claimed by [`take`](Self::take) once it was delivered.
    async fn complete(&self) -> Result<()>;

    /// Add messages to the end of the queue.
    async fn append(&self, messages: &[PendingMessage]) -> Result<()>;
}

/// Queue stored as a JSON list of `{"chat_id": ..., "message": ...}` objects.
///
/// `take` moves the file to `<queue>.processing` and `complete` deletes it.
/// Both, and `append`, hold the `<queue>.lock` file lock.
pub struct FileQueue {
    path: PathBuf,
}

impl FileQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where a claimed batch waits until its run completes.
    pub fn claim_path(&self) -> PathBuf {
        file::sidecar(&self.path, "processing")
    }

    async fn locked<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Path) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || file::with_exclusive_lock(&path, || op(&path))).await?
    }
}

fn read_entries(path: &Path) -> Result<Option<Vec<Value>>> {
    let Some(raw) = file::read_optional(path)
        .with_context(|| format!("failed to read {}", path.display()))?
    else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(Some(Vec::new()));
    }
    match serde_json::from_str::<Value>(&raw)? {
        Value::Array(entries) => Ok(Some(entries)),
        _ => Err(Error::invalid_queue(format!(
            "{} must contain a list of {{chat_id, message}} objects",
            path.display()
        ))),
    }
}

fn write_messages(path: &Path, messages: &[PendingMessage]) -> Result<()> {
    let json = serde_json::to_string_pretty(messages)?;
    file::write_atomic(path, json.as_bytes())?;
    Ok(())
}

#[async_trait]
impl PendingQueue for FileQueue {
    async fn take(&self) -> Result<QueueBatch> {
        let claim = self.claim_path();
        let entries = self
            .locked(move |path| {
                if claim.try_exists()? {
                    return Err(Error::UnfinishedRun {
                        path: claim.display().to_string(),
                    });
                }
                // Validate before claiming so a broken queue stays where it is.
                let entries = read_entries(path)?;
                if entries.is_some() {
                    std::fs::rename(path, &claim)?;
                }
                Ok(entries)
            })
            .await?;

        let Some(entries) = entries else {
            warn!(path = %self.path.display(), "no message queue found, nothing to broadcast");
            return Ok(QueueBatch::default());
        };

        let mut batch = QueueBatch::default();
        for entry in &entries {
            match PendingMessage::from_entry(entry) {
                Some(message) => batch.messages.push(message),
                None => {
                    warn!(%entry, "skipping invalid queue entry");
                    batch.skipped += 1;
                },
            }
        }
        debug!(
            path = %self.path.display(),
            messages = batch.messages.len(),
            skipped = batch.skipped,
            "message queue claimed"
        );
        Ok(batch)
    }

    async fn complete(&self) -> Result<()> {
        let claim = self.claim_path();
        self.locked(move |path| {
            if !path.try_exists()? {
                write_messages(path, &[])?;
            }
            file::remove_if_exists(&claim)?;
            Ok(())
        })
        .await?;
        debug!(path = %self.path.display(), "claimed batch cleared");
        Ok(())
    }

    async fn append(&self, messages: &[PendingMessage]) -> Result<()> {
        let messages = messages.to_vec();
        self.locked(move |path| {
            let mut queued: Vec<PendingMessage> = read_entries(path)?
                .unwrap_or_default()
                .iter()
                .filter_map(PendingMessage::from_entry)
                .collect();
            queued.extend(messages);
            write_messages(path, &queued)
        })
        .await
    }
}

/// Queue held in memory, for tests and programmatic runs.
#[derive(Default)]
pub struct InMemoryQueue {
    messages: Mutex<Vec<PendingMessage>>,
}

impl InMemoryQueue {
    pub fn new(messages: Vec<PendingMessage>) -> Self {
        Self {
            messages: Mutex::new(messages),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PendingQueue for InMemoryQueue {
    async fn take(&self) -> Result<QueueBatch> {
        let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        Ok(QueueBatch {
            messages: std::mem::take(&mut *messages),
            skipped: 0,
        })
    }

    async fn complete(&self) -> Result<()> {
        Ok(())
    }

    async fn append(&self, messages: &[PendingMessage]) -> Result<()> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(messages);
        Ok(())
    }
}
