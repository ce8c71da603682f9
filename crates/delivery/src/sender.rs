//! Outbound send primitive supplied by a platform adapter.

use async_trait::async_trait;

/// Classified send failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendFailure {
    /// The destination was permanently replaced by a new identifier.
    Migrated { new_destination_id: String },
    /// May succeed if re-queued later (rate limited, network).
    Transient { reason: String },
    /// Will not succeed as is (blocked, chat gone, bad id).
    Permanent { reason: String },
}

impl SendFailure {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::Permanent {
            reason: reason.into(),
        }
    }
}

/// Platform send primitive plus its error classifier.
///
/// The pipeline never inspects error text itself; everything it needs to
/// know about a failure comes from [`MessageSender::classify`].
#[async_trait]
pub trait MessageSender: Send + Sync {
    type Error: std::fmt::Display + Send + Sync;

    async fn send(&self, destination_id: &str, body: &str) -> Result<(), Self::Error>;

    fn classify(&self, error: &Self::Error) -> SendFailure;
}
