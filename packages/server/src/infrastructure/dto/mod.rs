//! Data Transfer Objects (DTOs) for the broadcast server.
//!
//! - `websocket`: request/response frames exchanged over `/ws`

pub mod websocket;
