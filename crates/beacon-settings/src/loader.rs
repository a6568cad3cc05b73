//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`BeaconSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply `BEACON_*` environment overrides (highest priority)
//! 4. Validate cross-field constraints
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use beacon_core::logging::LogFormat;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::BeaconSettings;

/// Resolve the path to the settings file (`~/.beacon/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".beacon").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<BeaconSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; a file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<BeaconSettings> {
    load_with_env(path, |name| std::env::var(name).ok())
}

/// Load settings from `path`, resolving env overrides through `env`.
pub fn load_with_env(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<BeaconSettings> {
    let defaults = serde_json::to_value(BeaconSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: BeaconSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, env);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `BEACON_*` overrides.
///
/// Invalid values are logged and ignored, falling back to file/default.
pub fn apply_env_overrides(settings: &mut BeaconSettings, env: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| env(name).filter(|v| !v.is_empty());

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read("BEACON_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("BEACON_PORT").and_then(|v| parsed("BEACON_PORT", &v, 0u16, u16::MAX)) {
        settings.server.port = v;
    }
    if let Some(v) = read("BEACON_MAX_CONNECTIONS")
        .and_then(|v| parsed("BEACON_MAX_CONNECTIONS", &v, 1usize, 1_000_000))
    {
        settings.server.max_connections = v;
    }
    if let Some(v) =
        read("BEACON_SEND_QUEUE").and_then(|v| parsed("BEACON_SEND_QUEUE", &v, 1usize, 65_536))
    {
        settings.server.send_queue_capacity = v;
    }
    if let Some(v) = read("BEACON_KEEPALIVE_SECS")
        .and_then(|v| parsed("BEACON_KEEPALIVE_SECS", &v, 1u64, 3_600))
    {
        settings.server.keepalive_interval_secs = v;
    }

    // ── Client ──────────────────────────────────────────────────────
    if let Some(v) = read("BEACON_SERVER_URL") {
        settings.client.server_url = v;
    }
    if let Some(v) = read("BEACON_IDENTITY") {
        settings.client.identity = Some(v);
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read("BEACON_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("BEACON_LOG_FORMAT") {
        match LogFormat::parse(&v) {
            Some(format) => settings.logging.format = format,
            None => warn!(key = "BEACON_LOG_FORMAT", value = %v, "invalid log format, ignoring"),
        }
    }
}

/// Parse a number within `[min, max]`.
pub fn parse_range<T: std::str::FromStr + PartialOrd>(val: &str, min: T, max: T) -> Option<T> {
    let n: T = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn parsed<T: std::str::FromStr + PartialOrd>(name: &str, val: &str, min: T, max: T) -> Option<T> {
    let result = parse_range(val, min, max);
    if result.is_none() {
        warn!(key = name, value = %val, "invalid numeric env var, ignoring");
    }
    result
}

fn validate(settings: &BeaconSettings) -> Result<()> {
    let client = &settings.client;
    let server = &settings.server;
    if client.notification_capacity == 0 {
        return Err(SettingsError::invalid("client.notification_capacity", "must be > 0"));
    }
    if client.alert_capacity == 0 {
        return Err(SettingsError::invalid("client.alert_capacity", "must be > 0"));
    }
    if !(0.0..=1.0).contains(&client.reconnect_jitter) {
        return Err(SettingsError::invalid(
            "client.reconnect_jitter",
            "must be within 0.0..=1.0",
        ));
    }
    if client.reconnect_base_delay_ms > client.reconnect_max_delay_ms {
        return Err(SettingsError::invalid(
            "client.reconnect_base_delay_ms",
            "must not exceed client.reconnect_max_delay_ms",
        ));
    }
    if server.send_queue_capacity == 0 {
        return Err(SettingsError::invalid("server.send_queue_capacity", "must be > 0"));
    }
    if server.keepalive_interval_secs == 0 {
        return Err(SettingsError::invalid("server.keepalive_interval_secs", "must be > 0"));
    }
    Ok(())
}
