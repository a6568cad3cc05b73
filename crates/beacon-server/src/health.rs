//! `/health` endpoint body.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"`, or `"starting"` before the dispatcher is installed.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Live WebSocket connections.
    pub connections: usize,
    /// Rooms with at least one member.
    pub rooms: usize,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    dispatcher_ready: bool,
    connections: usize,
    rooms: usize,
) -> HealthResponse {
    HealthResponse {
        status: if dispatcher_ready { "ok" } else { "starting" }.into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        rooms,
    }
}
