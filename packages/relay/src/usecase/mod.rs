//! UseCase layer of the relay.

mod error;
pub mod filter_event;
mod relay;
mod resolve_source;

pub use error::RelayError;
pub use filter_event::{DropReason, ForwardDecision, should_forward};
pub use relay::{
    Origin, RelayOrchestrator, RelayOutcome, RelayedNotice, UPSTREAM_RETRY_DELAY,
    format_channel_notification,
};
pub use resolve_source::SourceResolver;
