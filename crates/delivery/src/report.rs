use serde::Serialize;

/// Why a message ended up in [`DeliveryReport::failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Transient,
    Permanent,
    /// The destination moved and the rename or the retry failed.
    Migration,
}

impl FailureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::Migration => "migration",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDelivery {
    /// Last identifier the message was sent to.
    pub destination_id: String,
    pub reason: String,
    pub kind: FailureKind,
}

/// A destination identity change applied during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationEvent {
    pub old_destination_id: String,
    pub new_destination_id: String,
    pub registry_rows: usize,
    pub pending_rewritten: usize,
}

/// Complete record of one delivery run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Messages that reached the sender (queue entries minus skipped ones).
    pub attempted: usize,
    pub sent_count: usize,
    /// Destination each delivered message actually went to, in order.
    pub sent: Vec<String>,
    pub failed: Vec<FailedDelivery>,
    pub migrations: Vec<MigrationEvent>,
    /// Queue entries dropped before sending because they were incomplete.
    pub skipped: usize,
    /// Set when the claimed batch could not be cleared after the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_error: Option<String>,
}

impl DeliveryReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped == 0 && self.queue_error.is_none()
    }

    pub(crate) fn record_failure(
        &mut self,
        destination_id: impl Into<String>,
        reason: impl Into<String>,
        kind: FailureKind,
    ) {
        self.failed.push(FailedDelivery {
            destination_id: destination_id.into(),
            reason: reason.into(),
            kind,
        });
    }
}
