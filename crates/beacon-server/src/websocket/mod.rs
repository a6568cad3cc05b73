//! WebSocket connection state, frame handling, and session lifecycle.

pub mod connection;
pub mod handler;
pub mod session;
