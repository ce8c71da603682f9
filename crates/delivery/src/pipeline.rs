use std::{collections::VecDeque, sync::Arc, time::Duration};

use {
    herald_registry::RegistryStore,
    tokio::time::Instant,
    tracing::{error, info, warn},
};

#[cfg(feature = "metrics")]
use herald_metrics::{counter, delivery as delivery_metrics, histogram, labels};

use crate::{
    Result,
    message::PendingMessage,
    migration::MigrationResolver,
    queue::PendingQueue,
    report::{DeliveryReport, FailureKind, MigrationEvent},
    sender::{MessageSender, SendFailure},
};

/// Minimum spacing between successful sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    interval: Duration,
}

impl RateLimit {
    /// At most `messages` sends per second. `0` disables pacing.
    pub fn per_second(messages: u32) -> Self {
        let interval = if messages == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / messages
        };
        Self { interval }
    }

    pub fn unlimited() -> Self {
        Self {
            interval: Duration::ZERO,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::per_second(10)
    }
}

/// Sequential, rate-limited fan-out of pending messages.
pub struct DeliveryPipeline<S> {
    sender: S,
    resolver: MigrationResolver,
    rate: RateLimit,
}

impl<S: MessageSender> DeliveryPipeline<S> {
    pub fn new(sender: S, registry: Arc<dyn RegistryStore>, rate: RateLimit) -> Self {
        Self {
            sender,
            resolver: MigrationResolver::new(registry),
            rate,
        }
    }

    /// Claim `queue`, deliver everything, then clear the claimed batch.
    ///
    /// The batch is cleared whether or not individual messages failed; failed
    /// items are only reported. A queue that cannot be read is left untouched.
    /// Once sending started the report is always returned, and a failure to
    /// clear the batch is recorded in [`DeliveryReport::queue_error`].
    pub async fn run_queue(&self, queue: &dyn PendingQueue) -> Result<DeliveryReport> {
        let batch = queue.take().await?;
        let mut report = self.run(batch.messages).await;
        report.skipped = batch.skipped;
        if let Err(e) = queue.complete().await {
            error!(error = %e, "failed to clear the delivered queue batch");
            report.queue_error = Some(e.to_string());
        }
        Ok(report)
    }

    /// Deliver every message in order. Never stops early.
    pub async fn run(&self, messages: Vec<PendingMessage>) -> DeliveryReport {
        let started = Instant::now();
        let mut remaining: VecDeque<PendingMessage> = messages.into();
        let mut report = DeliveryReport::default();

        while let Some(message) = remaining.pop_front() {
            report.attempted += 1;
            self.deliver(message, &mut remaining, &mut report).await;
        }

        info!(
            attempted = report.attempted,
            sent = report.sent_count,
            failed = report.failed.len(),
            migrations = report.migrations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "broadcast run finished"
        );
        #[cfg(feature = "metrics")]
        histogram!(delivery_metrics::RUN_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        report
    }

    async fn deliver(
        &self,
        message: PendingMessage,
        remaining: &mut VecDeque<PendingMessage>,
        report: &mut DeliveryReport,
    ) {
        let error = match self
            .sender
            .send(&message.destination_id, &message.body)
            .await
        {
            Ok(()) => {
                self.record_sent(&message, remaining, report).await;
                return;
            },
            Err(e) => e,
        };

        match self.sender.classify(&error) {
            SendFailure::Migrated { new_destination_id } => {
                self.migrate_and_retry(message, new_destination_id, remaining, report)
                    .await;
            },
            SendFailure::Transient { reason } => {
                self.record_failed(report, &message.destination_id, reason, FailureKind::Transient);
            },
            SendFailure::Permanent { reason } => {
                self.record_failed(report, &message.destination_id, reason, FailureKind::Permanent);
            },
        }
    }

    async fn migrate_and_retry(
        &self,
        mut message: PendingMessage,
        new_id: String,
        remaining: &mut VecDeque<PendingMessage>,
        report: &mut DeliveryReport,
    ) {
        let old_id = message.destination_id.clone();
        let outcome = match self.resolver.resolve(&old_id, &new_id, remaining).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.record_failed(
                    report,
                    &old_id,
                    format!("destination moved to {new_id} but the registry update failed: {e}"),
                    FailureKind::Migration,
                );
                return;
            },
        };
        report.migrations.push(MigrationEvent {
            old_destination_id: old_id.clone(),
            new_destination_id: new_id.clone(),
            registry_rows: outcome.registry_rows,
            pending_rewritten: outcome.pending_rewritten,
        });
        #[cfg(feature = "metrics")]
        counter!(delivery_metrics::MIGRATIONS_TOTAL).increment(1);

        message.destination_id = new_id;
        match self
            .sender
            .send(&message.destination_id, &message.body)
            .await
        {
            Ok(()) => self.record_sent(&message, remaining, report).await,
            Err(e) => {
                let reason = match self.sender.classify(&e) {
                    SendFailure::Migrated { new_destination_id } => {
                        format!("destination moved again to {new_destination_id}")
                    },
                    SendFailure::Transient { reason } | SendFailure::Permanent { reason } => reason,
                };
                self.record_failed(
                    report,
                    &message.destination_id,
                    format!("retry after migration from {old_id} failed: {reason}"),
                    FailureKind::Migration,
                );
            },
        }
    }

    async fn record_sent(
        &self,
        message: &PendingMessage,
        remaining: &VecDeque<PendingMessage>,
        report: &mut DeliveryReport,
    ) {
        info!(
            destination_id = %message.destination_id,
            preview = %message.preview(),
            "message sent"
        );
        report.sent_count += 1;
        report.sent.push(message.destination_id.clone());
        #[cfg(feature = "metrics")]
        counter!(delivery_metrics::SENT_TOTAL).increment(1);

        if !remaining.is_empty() && !self.rate.interval().is_zero() {
            tokio::time::sleep(self.rate.interval()).await;
        }
    }

    fn record_failed(
        &self,
        report: &mut DeliveryReport,
        destination_id: &str,
        reason: String,
        kind: FailureKind,
    ) {
        warn!(destination_id, kind = kind.as_str(), %reason, "message not delivered");
        #[cfg(feature = "metrics")]
        counter!(delivery_metrics::FAILED_TOTAL, labels::KIND => kind.as_str()).increment(1);
        report.record_failure(destination_id, reason, kind);
    }
}
