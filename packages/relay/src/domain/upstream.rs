//! Upstream collaborator traits
//!
//! 上流プロトコルクライアントへのインターフェース。
//! UseCase 層はこの trait にのみ依存し、具体的なプロトコル実装 (Bot API など) には依存しない。

use async_trait::async_trait;

use super::{InboundEvent, ResolveError, SourceId, UpstreamError};

/// Handle-to-identity lookup
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PeerDirectory: Send + Sync {
    /// Resolve a normalized handle (no leading `@`) to its source identity
    async fn resolve_domain(&self, handle: &str) -> Result<SourceId, ResolveError>;
}

/// Sequence of inbound events
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UpdateSource: Send {
    /// Wait for the next event. `Ok(None)` means the source has ended.
    async fn next_event(&mut self) -> Result<Option<InboundEvent>, UpstreamError>;
}
