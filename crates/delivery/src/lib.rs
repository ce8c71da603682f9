//! Broadcast delivery.
//!
//! A run drains a queue of pending messages, sends each one through a
//! platform [`MessageSender`] at a bounded rate, and reports per-destination
//! failures without aborting the batch. When the platform reports that a
//! destination moved, the [`MigrationResolver`] rewrites the registry and the
//! rest of the batch before the message is retried once.

pub mod error;
pub mod message;
pub mod migration;
pub mod pipeline;
pub mod queue;
pub mod report;
pub mod sender;
pub mod targeting;

pub use {
    error::{Error, Result},
    message::PendingMessage,
    migration::{MigrationOutcome, MigrationResolver},
    pipeline::{DeliveryPipeline, RateLimit},
    queue::{FileQueue, InMemoryQueue, PendingQueue, QueueBatch},
    report::{DeliveryReport, FailedDelivery, FailureKind, MigrationEvent},
    sender::{MessageSender, SendFailure},
    targeting::{BroadcastFilter, plan_broadcast},
};
