//! Event dispatch: the single entry point producers use to emit events.
//!
//! [`Dispatcher::send_notification`] targets one room, while
//! [`Dispatcher::broadcast_alert`] reaches every live connection. Both are
//! single-attempt and at-most-once. An empty room yields a report with zero
//! recipients rather than an error.

use std::sync::{Arc, OnceLock};

use beacon_core::{
    AlertDraft, AlertEvent, BeaconError, NotificationDraft, NotificationEvent, Result, RoomKey,
    ServerMessage,
};
use metrics::counter;
use tracing::{debug, info};

use crate::metrics::{ALERTS_BROADCAST_TOTAL, NOTIFICATIONS_DISPATCHED_TOTAL};
use crate::registry::{ConnectionRegistry, DeliveryReport};

/// Routes events to connections resolved through the registry.
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl Dispatcher {
    /// Create a dispatcher over `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this dispatcher resolves targets from.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Deliver `event` to every current member of `room`.
    pub fn send_notification(
        &self,
        room: &RoomKey,
        event: &NotificationEvent,
    ) -> Result<DeliveryReport> {
        let frame = Arc::new(ServerMessage::Notification(event.clone()).encode()?);
        let report = self.registry.deliver_to_room(room, &frame);
        counter!(NOTIFICATIONS_DISPATCHED_TOTAL).increment(1);
        if report.recipients == 0 {
            debug!(%room, event_id = %event.id, "notification room has no members, dropped");
        } else {
            info!(
                %room,
                event_id = %event.id,
                recipients = report.recipients,
                delivered = report.delivered,
                "notification dispatched"
            );
        }
        Ok(report)
    }

    /// Deliver `alert` to every registered connection.
    pub fn broadcast_alert(&self, alert: &AlertEvent) -> Result<DeliveryReport> {
        let frame = Arc::new(ServerMessage::GlobalAlert(alert.clone()).encode()?);
        let report = self.registry.deliver_to_all(&frame);
        counter!(ALERTS_BROADCAST_TOTAL).increment(1);
        info!(
            event_id = %alert.id,
            severity = alert.severity.value(),
            level = alert.severity.level().as_str(),
            recipients = report.recipients,
            delivered = report.delivered,
            "alert broadcast"
        );
        Ok(report)
    }

    /// Validate a producer notification for `identity` and send it.
    ///
    /// Nothing is delivered if any field is invalid.
    pub fn notify(
        &self,
        identity: &str,
        draft: NotificationDraft,
    ) -> Result<(NotificationEvent, DeliveryReport)> {
        let room =
            RoomKey::new(identity).ok_or_else(|| BeaconError::invalid("room", "must not be empty"))?;
        let event = draft.into_event()?;
        let report = self.send_notification(&room, &event)?;
        Ok((event, report))
    }

    /// Validate a producer alert and broadcast it.
    pub fn alert(&self, draft: AlertDraft) -> Result<(AlertEvent, DeliveryReport)> {
        let alert = draft.into_event()?;
        let report = self.broadcast_alert(&alert)?;
        Ok((alert, report))
    }
}

/// Shared slot for the process dispatcher.
///
/// Producers hold a handle from startup; until the server installs the
/// dispatcher, [`DispatcherHandle::get`] fails with
/// [`BeaconError::DispatcherNotInitialized`].
#[derive(Clone, Default)]
pub struct DispatcherHandle {
    slot: Arc<OnceLock<Arc<Dispatcher>>>,
}

impl DispatcherHandle {
    /// Create an empty handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `dispatcher`. Returns `false` if one was already installed.
    pub fn install(&self, dispatcher: Arc<Dispatcher>) -> bool {
        self.slot.set(dispatcher).is_ok()
    }

    /// The installed dispatcher.
    pub fn get(&self) -> Result<Arc<Dispatcher>> {
        self.slot
            .get()
            .cloned()
            .ok_or(BeaconError::DispatcherNotInitialized)
    }

    /// Whether a dispatcher has been installed.
    pub fn is_initialized(&self) -> bool {
        self.slot.get().is_some()
    }
}
