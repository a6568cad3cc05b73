//! Settings types.
//!
//! Every struct carries `#[serde(default)]` so a partial user file only needs
//! the keys it overrides.

use beacon_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

/// Root settings document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconSettings {
    /// Server side.
    pub server: ServerSettings,
    /// Client side.
    pub client: ClientSettings,
    /// Logging.
    pub logging: LoggingSettings,
}

/// WebSocket/HTTP server settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind host.
    pub host: String,
    /// Bind port (`0` auto-assigns).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Per-connection outbound queue capacity.
    pub send_queue_capacity: usize,
    /// Interval between transport-level keepalive pings.
    pub keepalive_interval_secs: u64,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// How long shutdown waits for sessions to drain.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9850,
            max_connections: 1024,
            send_queue_capacity: 256,
            keepalive_interval_secs: 30,
            max_message_size: 64 * 1024,
            shutdown_timeout_secs: 10,
        }
    }
}

/// Dashboard client settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// WebSocket endpoint.
    pub server_url: String,
    /// Identity used for `join-room`.
    pub identity: Option<String>,
    /// Notification buffer capacity.
    pub notification_capacity: usize,
    /// Alert buffer capacity.
    pub alert_capacity: usize,
    /// First reconnect delay.
    pub reconnect_base_delay_ms: u64,
    /// Reconnect delay cap.
    pub reconnect_max_delay_ms: u64,
    /// Jitter factor 0.0–1.0 applied to reconnect delays.
    pub reconnect_jitter: f64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:9850/ws".into(),
            identity: None,
            notification_capacity: 50,
            alert_capacity: 10,
            reconnect_base_delay_ms: 500,
            reconnect_max_delay_ms: 30_000,
            reconnect_jitter: 0.2,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Compact,
        }
    }
}
