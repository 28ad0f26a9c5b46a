//! UI layer: HTTP routing and WebSocket session handling.

mod handler;
mod server;
pub mod state;

pub use server::Server;
