//! Domain layer of the broadcast server.

mod broadcaster;
mod connection;

pub use broadcaster::{BroadcastReport, Broadcaster};
pub use connection::ConnectionId;
