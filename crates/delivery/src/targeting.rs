use std::collections::HashSet;

use {herald_common::types::Frequency, herald_registry::Subscription};

use crate::message::PendingMessage;

/// Selects which subscriptions a broadcast goes to. Empty fields match all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastFilter {
    pub frequency: Option<Frequency>,
    pub source_id: Option<String>,
}

impl BroadcastFilter {
    fn matches(&self, subscription: &Subscription) -> bool {
        self.frequency
            .is_none_or(|frequency| subscription.frequency == frequency)
            && self
                .source_id
                .as_deref()
                .is_none_or(|source| subscription.source_id == source)
    }
}

/// Build one pending message per matching destination, in registry order.
///
/// Internal-tagged rows are never targeted unless the filter asks for them.
pub fn plan_broadcast(
    subscriptions: &[Subscription],
    filter: &BroadcastFilter,
    body: &str,
) -> Vec<PendingMessage> {
    let mut seen = HashSet::new();
    subscriptions
        .iter()
        .filter(|s| !s.frequency.is_internal() || filter.frequency == Some(Frequency::Internal))
        .filter(|s| filter.matches(s))
        .filter(|s| seen.insert(s.destination_id.as_str()))
        .map(|s| PendingMessage::new(s.destination_id.clone(), body))
        .collect()
}
