//! Metric name and label definitions.
//!
//! Every metric herald records is named here so the exported set is easy to
//! audit in one place.

/// Subscription registry metrics
pub mod registry {
    /// Rows in the registry after the last published write
    pub const SUBSCRIPTIONS: &str = "herald_registry_subscriptions";
}

/// Command processor metrics
pub mod commands {
    /// Commands handled, labelled by `command` and `outcome`
    pub const HANDLED_TOTAL: &str = "herald_commands_handled_total";
    /// Commands dropped by the allow-list check
    pub const DENIED_TOTAL: &str = "herald_commands_denied_total";
}

/// Broadcast delivery metrics
pub mod delivery {
    /// Messages delivered
    pub const SENT_TOTAL: &str = "herald_delivery_sent_total";
    /// Messages that could not be delivered, labelled by `kind`
    pub const FAILED_TOTAL: &str = "herald_delivery_failed_total";
    /// Destination migrations applied during runs
    pub const MIGRATIONS_TOTAL: &str = "herald_delivery_migrations_total";
    /// Wall-clock duration of a full run in seconds
    pub const RUN_DURATION_SECONDS: &str = "herald_delivery_run_duration_seconds";
}

/// Telegram adapter metrics
pub mod telegram {
    /// Messages received from Telegram
    pub const MESSAGES_RECEIVED_TOTAL: &str = "herald_telegram_messages_received_total";
    /// Telegram requests retried after a flood-wait response
    pub const RETRY_AFTER_TOTAL: &str = "herald_telegram_retry_after_total";
}

/// Common label keys
pub mod labels {
    pub const COMMAND: &str = "command";
    pub const OUTCOME: &str = "outcome";
    pub const KIND: &str = "kind";
}
