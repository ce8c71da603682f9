use herald_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The queue file exists but is not a list of messages.
    #[error("invalid message queue: {message}")]
    InvalidQueue { message: String },

    /// A claimed batch from an earlier run is still on disk.
    #[error(
        "{path} holds a batch claimed by a run that is still going or did not finish; \
         deliver or delete it before broadcasting again"
    )]
    UnfinishedRun { path: String },

    #[error("queue task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Registry(#[from] herald_registry::Error),

    #[error("{0}")]
    Message(String),
}

impl Error {
    #[must_use]
    pub fn invalid_queue(message: impl Into<String>) -> Self {
        Self::InvalidQueue {
            message: message.into(),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

herald_common::impl_context!();
