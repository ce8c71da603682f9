use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad command syntax or arguments. Answered with usage, no state change.
    #[error("{message}")]
    Validation { message: String },

    /// The registry could not be read or written.
    #[error(transparent)]
    Registry(#[from] herald_registry::Error),
}

impl Error {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
