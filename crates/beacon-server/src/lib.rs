//! # beacon-server
//!
//! Real-time delivery of security notifications and alerts over WebSocket.
//!
//! - [`registry`]: live connections and their identity-room membership
//! - [`dispatcher`]: targeted (`notification`) and broadcast (`global-alert`) delivery
//! - [`websocket`]: per-connection transport session lifecycle
//! - [`server`]: Axum router, producer HTTP endpoints, `/health`, `/metrics`
//! - [`shutdown`]: graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod dispatcher;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod websocket;
