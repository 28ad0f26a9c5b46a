//! Errors raised at the upstream boundary.

use thiserror::Error;

/// Failure to map a handle to a source identity.
///
/// Non-fatal: the source stays unmatched until a later resolution succeeds.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("source handle is empty")]
    EmptyHandle,

    #[error("failed to resolve '{handle}': {reason}")]
    Lookup { handle: String, reason: String },
}

/// Failure while pulling events from the upstream
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream transport error: {0}")]
    Transport(String),

    #[error("upstream API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("malformed upstream response: {0}")]
    Decode(String),
}
