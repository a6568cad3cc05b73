//! # beacon-core
//!
//! Shared vocabulary for the Beacon notification subsystem.
//!
//! - **Branded IDs**: [`ConnectionId`], [`EventId`] and the [`RoomKey`] identity key
//! - **Events**: targeted [`NotificationEvent`] and broadcast [`AlertEvent`]
//! - **Severity**: the 0–10 [`Severity`] scale and its display tiers
//! - **Protocol**: JSON frames exchanged over the WebSocket transport
//! - **Errors**: [`BeaconError`] taxonomy with stable wire codes
//! - **Logging**: `tracing` subscriber initialisation

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod ids;
pub mod logging;
pub mod protocol;

pub use errors::{BeaconError, Result};
pub use events::{AlertDraft, AlertEvent, NotificationDraft, NotificationEvent, Severity, SeverityLevel};
pub use ids::{ConnectionId, EventId, RoomKey};
pub use protocol::{ClientMessage, ServerMessage};
