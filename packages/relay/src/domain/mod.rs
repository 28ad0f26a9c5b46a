//! Domain layer of the relay.

mod error;
mod source;
mod upstream;

pub use error::{ResolveError, UpstreamError};
pub use source::{InboundEvent, MonitoredSource, SourceId, UNRESOLVED, normalize_handle};
pub use upstream::{PeerDirectory, UpdateSource};

#[cfg(test)]
pub use upstream::{MockPeerDirectory, MockUpdateSource};
