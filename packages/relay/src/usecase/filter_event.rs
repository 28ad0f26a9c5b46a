//! Forwarding decision for inbound events.
//!
//! Pure logic without side effects, so it can be tested without any upstream.

use crate::domain::{InboundEvent, MonitoredSource, SourceId};

/// Why an event was not forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    EmptyText,
    UnmonitoredSource(SourceId),
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::EmptyText => write!(f, "empty text"),
            DropReason::UnmonitoredSource(id) => write!(f, "source {} is not monitored", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardDecision {
    /// Forward the event text
    Forward(String),
    Drop(DropReason),
}

impl ForwardDecision {
    pub fn is_forward(&self) -> bool {
        matches!(self, ForwardDecision::Forward(_))
    }
}

/// Decide whether `event` should be relayed.
///
/// # Arguments
///
/// * `event` - The inbound event
/// * `sources` - Monitored sources; unresolved ones never match
///
/// # Returns
///
/// `Forward` iff the event comes from a resolved monitored source and carries text.
/// Several sources resolving to the same id still produce a single decision.
pub fn should_forward(event: &InboundEvent, sources: &[MonitoredSource]) -> ForwardDecision {
    if !sources.iter().any(|source| source.matches(event.source_id)) {
        return ForwardDecision::Drop(DropReason::UnmonitoredSource(event.source_id));
    }
    if event.text.is_empty() {
        return ForwardDecision::Drop(DropReason::EmptyText);
    }
    ForwardDecision::Forward(event.text.clone())
}
