//! Metrics collection and export for herald.
//!
//! Crates record through the `metrics` facade using the names in this crate.
//! When the `prometheus` feature is enabled, [`init_metrics`] installs a
//! Prometheus recorder whose [`MetricsHandle::render`] output can be written
//! as a node-exporter textfile after a broadcast run.
//!
//! ```rust,ignore
//! use herald_metrics::{counter, delivery};
//!
//! counter!(delivery::SENT_TOTAL).increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
