//! Monitored sources and inbound events.

/// Numeric identity of an upstream broadcast source
pub type SourceId = i64;

/// Value returned by the lenient resolver when a handle cannot be resolved
pub const UNRESOLVED: SourceId = 0;

/// One configured broadcast source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredSource {
    /// Handle without the leading `@`
    pub handle: String,
    /// Upstream identity, `None` until resolution succeeds
    pub resolved_id: Option<SourceId>,
}

impl MonitoredSource {
    pub fn unresolved(handle: &str) -> Self {
        Self {
            handle: normalize_handle(handle).to_string(),
            resolved_id: None,
        }
    }

    pub fn resolved(handle: &str, id: SourceId) -> Self {
        Self {
            handle: normalize_handle(handle).to_string(),
            resolved_id: Some(id),
        }
    }

    /// Whether this source resolved to `id`
    pub fn matches(&self, id: SourceId) -> bool {
        self.resolved_id == Some(id)
    }
}

/// One post observed on the upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub source_id: SourceId,
    pub text: String,
    /// Unix timestamp at arrival (milliseconds)
    pub received_at_millis: i64,
}

impl InboundEvent {
    pub fn new(source_id: SourceId, text: impl Into<String>, received_at_millis: i64) -> Self {
        Self {
            source_id,
            text: text.into(),
            received_at_millis,
        }
    }
}

/// Strip surrounding whitespace and one leading `@`
pub fn normalize_handle(handle: &str) -> &str {
    let handle = handle.trim();
    handle.strip_prefix('@').unwrap_or(handle)
}
