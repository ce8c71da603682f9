use std::sync::Arc;

use {
    herald_common::types::{DuplicatePolicy, Frequency, INTERNAL_SOURCE_ID},
    herald_registry::{RegistryStore, Subscription, UpsertOutcome},
    tracing::{debug, info},
};

#[cfg(feature = "metrics")]
use herald_metrics::{commands as cmd_metrics, counter, labels};

use crate::{
    access::{Access, AccessControl, AccessDenied},
    command::InboundCommand,
    error::{Error, Result},
};

pub const SUBSCRIBE_USAGE: &str =
    "Usage: /subscribe <daily|weekly|manual> <source id>, e.g. /subscribe daily 7";

const HELP_TEXT: &str = "Commands:\n\
    /subscribe <daily|weekly|manual> <source id> - subscribe this chat\n\
    /unsubscribe - stop all broadcasts to this chat\n\
    /status - show this chat's subscription";

/// What the adapter should do with a handled command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Answer the originating chat with this text.
    Reply(String),
    /// Caller is not authorized. Send nothing.
    Denied(AccessDenied),
    /// Not a command this processor knows.
    Ignored,
}

impl CommandOutcome {
    /// Stable name used as the `outcome` metric label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reply(_) => "reply",
            Self::Denied(_) => "denied",
            Self::Ignored => "ignored",
        }
    }
}

/// Applies subscription commands to the registry.
pub struct CommandProcessor {
    registry: Arc<dyn RegistryStore>,
    access: AccessControl,
    on_duplicate: DuplicatePolicy,
}

impl CommandProcessor {
    pub fn new(
        registry: Arc<dyn RegistryStore>,
        access: AccessControl,
        on_duplicate: DuplicatePolicy,
    ) -> Self {
        Self {
            registry,
            access,
            on_duplicate,
        }
    }

    /// Authorize, validate and apply one inbound command.
    ///
    /// Validation failures and unknown destinations become replies; only
    /// storage failures are returned as errors.
    pub async fn handle(&self, command: &InboundCommand) -> Result<CommandOutcome> {
        let outcome = self.dispatch(command).await?;

        #[cfg(feature = "metrics")]
        {
            // Unknown names are user input; keep them out of label values.
            let name = match outcome {
                CommandOutcome::Ignored => "other",
                _ => command.command_name.as_str(),
            };
            counter!(
                cmd_metrics::HANDLED_TOTAL,
                labels::COMMAND => name.to_string(),
                labels::OUTCOME => outcome.as_str()
            )
            .increment(1);
        }

        Ok(outcome)
    }

    async fn dispatch(&self, command: &InboundCommand) -> Result<CommandOutcome> {
        let name = command.command_name.as_str();
        if !matches!(name, "subscribe" | "unsubscribe" | "status" | "help" | "start") {
            debug!(command = name, "ignoring unknown command");
            return Ok(CommandOutcome::Ignored);
        }

        if let Access::Denied(reason) = self.access.authorize(&command.principal) {
            info!(
                command = name,
                destination_id = %command.destination_id,
                principal = %command.principal.id,
                username = ?command.principal.username,
                %reason,
                "command denied"
            );
            #[cfg(feature = "metrics")]
            counter!(cmd_metrics::DENIED_TOTAL).increment(1);
            return Ok(CommandOutcome::Denied(reason));
        }

        let reply = match name {
            "subscribe" => {
                let frequency = command.args.first().map(String::as_str).unwrap_or("");
                let source = command.args.get(1).map(String::as_str);
                if command.args.len() > 2 {
                    usage_reply(&Error::validation("too many arguments"))
                } else {
                    match self
                        .subscribe(
                            &command.destination_id,
                            &command.destination_label,
                            frequency,
                            source,
                        )
                        .await
                    {
                        Ok((subscription, outcome)) => subscribe_reply(&subscription, &outcome),
                        Err(e @ Error::Validation { .. }) => usage_reply(&e),
                        Err(e) => return Err(e),
                    }
                }
            },
            "unsubscribe" => match self.unsubscribe(&command.destination_id).await? {
                0 => "This chat is not subscribed.".to_string(),
                _ => "Unsubscribed. This chat will no longer receive broadcasts.".to_string(),
            },
            "status" => status_reply(&self.status(&command.destination_id).await?),
            _ => HELP_TEXT.to_string(),
        };

        Ok(CommandOutcome::Reply(reply))
    }

    /// Validate and store a subscription for `destination_id`.
    pub async fn subscribe(
        &self,
        destination_id: &str,
        destination_label: &str,
        frequency: &str,
        source_id: Option<&str>,
    ) -> Result<(Subscription, UpsertOutcome)> {
        let (frequency, source_id) = validate_subscribe(frequency, source_id)?;
        let subscription =
            Subscription::new(destination_id, destination_label, frequency, source_id);
        let outcome = self
            .registry
            .upsert(&subscription, self.on_duplicate)
            .await?;
        info!(
            destination_id,
            frequency = %subscription.frequency,
            source_id = %subscription.source_id,
            ?outcome,
            "subscribe handled"
        );
        Ok((subscription, outcome))
    }

    /// Remove every subscription of `destination_id`. Returns the row count.
    pub async fn unsubscribe(&self, destination_id: &str) -> Result<usize> {
        let removed = self.registry.remove(destination_id).await?;
        info!(destination_id, removed, "unsubscribe handled");
        Ok(removed)
    }

    /// Current subscriptions of `destination_id`.
    pub async fn status(&self, destination_id: &str) -> Result<Vec<Subscription>> {
        Ok(self.registry.find_all(destination_id).await?)
    }
}

/// Check a subscribe request and return the normalized frequency and source.
fn validate_subscribe(frequency: &str, source_id: Option<&str>) -> Result<(Frequency, String)> {
    if frequency.trim().is_empty() {
        return Err(Error::validation("missing frequency"));
    }
    let frequency: Frequency = frequency
        .parse()
        .map_err(|e: herald_common::Error| Error::validation(e.to_string()))?;

    let source = source_id
        .map(|s| s.trim().trim_start_matches('#'))
        .filter(|s| !s.is_empty());

    if frequency.is_internal() {
        return match source {
            None | Some(INTERNAL_SOURCE_ID) => Ok((frequency, INTERNAL_SOURCE_ID.to_string())),
            Some(other) => Err(Error::validation(format!(
                "internal broadcasts use source {INTERNAL_SOURCE_ID}, not {other}"
            ))),
        };
    }

    let Some(source) = source else {
        return Err(Error::validation("missing source id"));
    };
    if !source.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::validation(format!(
            "source id must be numeric, got '{source}'"
        )));
    }
    if source.chars().all(|c| c == '0') {
        return Err(Error::validation(
            "source id 0 is reserved for internal broadcasts",
        ));
    }
    Ok((frequency, source.to_string()))
}

fn describe(subscription: &Subscription) -> String {
    format!("{}/#{}", subscription.frequency, subscription.source_id)
}

fn subscribe_reply(subscription: &Subscription, outcome: &UpsertOutcome) -> String {
    match outcome {
        UpsertOutcome::Created => format!("Subscribed: {}.", describe(subscription)),
        UpsertOutcome::Updated { .. } => {
            format!("Subscription updated: {}.", describe(subscription))
        },
        UpsertOutcome::Unchanged => format!("Already subscribed: {}.", describe(subscription)),
        UpsertOutcome::Rejected { existing } => format!(
            "Already subscribed: {}. Use /unsubscribe first to change it.",
            describe(existing)
        ),
    }
}

fn status_reply(subscriptions: &[Subscription]) -> String {
    if subscriptions.is_empty() {
        return "Not subscribed.".to_string();
    }
    let lines: Vec<String> = subscriptions.iter().map(describe).collect();
    format!("Subscribed: {}", lines.join(", "))
}

fn usage_reply(error: &Error) -> String {
    format!("Invalid subscription: {error}.\n{SUBSCRIBE_USAGE}")
}
