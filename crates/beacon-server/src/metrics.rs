//! Prometheus recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Fails if a recorder is already installed in this process.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Build a handle without installing it globally.
///
/// Used when a recorder already exists, so `/metrics` still renders.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// Render the Prometheus text format.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// WebSocket connections accepted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket sessions closed (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Open WebSocket sessions (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Connections refused at the connection cap (counter).
pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
/// Session lifetime in seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Successful `join-room` requests (counter).
pub const ROOM_JOINS_TOTAL: &str = "room_joins_total";
/// Targeted notifications dispatched (counter).
pub const NOTIFICATIONS_DISPATCHED_TOTAL: &str = "notifications_dispatched_total";
/// Alerts broadcast (counter).
pub const ALERTS_BROADCAST_TOTAL: &str = "alerts_broadcast_total";
/// Frames dropped on a full or closed connection queue (counter).
pub const DELIVERIES_DROPPED_TOTAL: &str = "deliveries_dropped_total";
