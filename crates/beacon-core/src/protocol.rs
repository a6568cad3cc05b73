//! JSON frames exchanged over the WebSocket transport.
//!
//! Every frame is `{"type": "...", "data": {...}}` with a kebab-case type.

use serde::{Deserialize, Serialize};

use crate::errors::{BeaconError, Result};
use crate::events::{AlertEvent, NotificationEvent};
use crate::ids::{ConnectionId, RoomKey};

/// Frame sent by a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Join (or move to) the room for `identity`.
    JoinRoom {
        /// Account identifier supplied by the session layer.
        identity: String,
    },
    /// Advisory liveness probe.
    Ping {
        /// Echoed back in the `pong`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<String>,
    },
}

/// Frame sent by the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// First frame on every connection.
    #[serde(rename_all = "camelCase")]
    ConnectionEstablished {
        /// Server-assigned connection identifier.
        connection_id: ConnectionId,
    },
    /// Acknowledges a `join-room`.
    Joined {
        /// Room the connection now belongs to.
        room: RoomKey,
    },
    /// Targeted event.
    Notification(NotificationEvent),
    /// Broadcast event.
    GlobalAlert(AlertEvent),
    /// Reply to `ping`.
    Pong {
        /// Payload from the matching `ping`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<String>,
    },
    /// A client frame was rejected.
    Error {
        /// Stable code from [`BeaconError::code`].
        code: String,
        /// Human-readable description.
        message: String,
    },
}

impl ClientMessage {
    /// Build a join request.
    pub fn join(identity: impl Into<String>) -> Self {
        Self::JoinRoom {
            identity: identity.into(),
        }
    }

    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| BeaconError::Protocol(e.to_string()))
    }

    /// Encode as a text frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl ServerMessage {
    /// Build an `error` frame from a [`BeaconError`].
    pub fn error(err: &BeaconError) -> Self {
        Self::Error {
            code: err.code().to_owned(),
            message: err.to_string(),
        }
    }

    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| BeaconError::Protocol(e.to_string()))
    }

    /// Encode as a text frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
