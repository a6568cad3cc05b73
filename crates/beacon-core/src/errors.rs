//! Error taxonomy for the notification subsystem.
//!
//! Transport failures (dropped sockets, full send queues) are deliberately
//! absent: they close the affected session and never reach a producer. What
//! remains are the conditions a producer or a client frame can actually hit.

use thiserror::Error;

use crate::ids::ConnectionId;

/// Errors surfaced by registry, dispatcher, and protocol operations.
#[derive(Debug, Error)]
pub enum BeaconError {
    /// A producer asked for the dispatcher before the server installed one.
    #[error("notification service unavailable: dispatcher not initialized")]
    DispatcherNotInitialized,

    /// A producer payload failed validation and was not dispatched.
    #[error("invalid payload: {field} {reason}")]
    InvalidPayload {
        /// Offending field name.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The connection is not (or no longer) registered.
    #[error("unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    /// An inbound frame could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// JSON encoding failed.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BeaconError {
    /// Shorthand for [`BeaconError::InvalidPayload`].
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            field,
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code sent in `error` frames and HTTP bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DispatcherNotInitialized => "SERVICE_UNAVAILABLE",
            Self::InvalidPayload { .. } => "INVALID_PAYLOAD",
            Self::UnknownConnection(_) => "UNKNOWN_CONNECTION",
            Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Result alias for Beacon operations.
pub type Result<T> = std::result::Result<T, BeaconError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_initialized_is_distinct_code() {
        let err = BeaconError::DispatcherNotInitialized;
        assert_eq!(err.code(), "SERVICE_UNAVAILABLE");
        assert!(err.to_string().contains("unavailable"));
    }

    #[test]
    fn invalid_payload_display() {
        let err = BeaconError::invalid("severity", "must be between 0 and 10");
        assert_eq!(err.code(), "INVALID_PAYLOAD");
        assert_eq!(
            err.to_string(),
            "invalid payload: severity must be between 0 and 10"
        );
    }

    #[test]
    fn unknown_connection_mentions_id() {
        let err = BeaconError::UnknownConnection(ConnectionId::from("conn_9"));
        assert_eq!(err.code(), "UNKNOWN_CONNECTION");
        assert!(err.to_string().contains("conn_9"));
    }

    #[test]
    fn json_error_converts() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err: BeaconError = json_err.into();
        assert!(matches!(err, BeaconError::Serialization(_)));
        assert_eq!(err.code(), "SERIALIZATION_ERROR");
    }
}
