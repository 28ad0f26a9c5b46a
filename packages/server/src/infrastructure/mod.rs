//! Infrastructure layer: wire DTOs and the connection registry.

pub mod connection_manager;
pub mod dto;

pub use connection_manager::{Connection, ConnectionManager, OUTBOUND_BUFFER};
