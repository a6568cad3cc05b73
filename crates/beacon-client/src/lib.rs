//! # beacon-client
//!
//! Dashboard side of the Beacon notification subsystem.
//!
//! - [`store`]: bounded notification and alert buffers with dismissal
//! - [`escalation`]: when to raise a native notification, and the host seam
//! - [`client`]: reconnecting WebSocket driver feeding the store

#![deny(unsafe_code)]

pub mod buffer;
pub mod client;
pub mod escalation;
pub mod store;

pub use buffer::BoundedBuffer;
pub use client::{ClientError, ClientEvent, NotificationClient, ReconnectPolicy};
pub use escalation::{
    EscalationDecision, LogNotifier, NativeNotification, NativeNotifier, PermissionState,
};
pub use store::NotificationStore;
