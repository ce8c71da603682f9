use thiserror::Error;

/// Storage failure. Any error surfaced by a registry backend is fatal to the
/// current operation and leaves the published table untouched.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("registry task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Field(#[from] herald_common::Error),

    #[error("corrupt registry table: {message}")]
    CorruptTable { message: String },
}

impl Error {
    #[must_use]
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptTable {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
