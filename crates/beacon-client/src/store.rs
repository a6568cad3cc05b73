//! Client notification store: bounded local mirror of pushed events.
//!
//! Transport state never touches the buffers. They change only when an
//! event arrives, when the user dismisses or clears, and by capacity
//! eviction. Nothing missed while offline is replayed.

use beacon_core::{
    AlertEvent, ClientMessage, ConnectionId, EventId, NotificationEvent, RoomKey, ServerMessage,
};
use beacon_settings::ClientSettings;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::buffer::BoundedBuffer;
use crate::escalation::{NativeNotification, PermissionState};

/// Default notification buffer capacity.
pub const NOTIFICATION_CAPACITY: usize = 50;
/// Default alert buffer capacity.
pub const ALERT_CAPACITY: usize = 10;

/// Local view of notifications and alerts for one dashboard client.
#[derive(Debug)]
pub struct NotificationStore {
    notifications: BoundedBuffer<NotificationEvent>,
    alerts: BoundedBuffer<AlertEvent>,
    identity: Option<String>,
    permission: PermissionState,
    connected: bool,
    connection_id: Option<ConnectionId>,
    room: Option<RoomKey>,
    last_pong: Option<DateTime<Utc>>,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new(NOTIFICATION_CAPACITY, ALERT_CAPACITY)
    }
}

impl NotificationStore {
    /// Create an empty, disconnected store.
    pub fn new(notification_capacity: usize, alert_capacity: usize) -> Self {
        Self {
            notifications: BoundedBuffer::new(notification_capacity),
            alerts: BoundedBuffer::new(alert_capacity),
            identity: None,
            permission: PermissionState::Default,
            connected: false,
            connection_id: None,
            room: None,
            last_pong: None,
        }
    }

    /// Create a store sized and identified from settings.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        let mut store = Self::new(settings.notification_capacity, settings.alert_capacity);
        store.set_identity(settings.identity.clone());
        store
    }

    /// Set the session identity sent on every (re)connect.
    pub fn set_identity(&mut self, identity: Option<String>) {
        self.identity = identity.filter(|i| !i.trim().is_empty());
    }

    /// Current session identity.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Record the host's notification permission.
    pub fn set_permission(&mut self, permission: PermissionState) {
        self.permission = permission;
    }

    /// Host's notification permission.
    pub fn permission(&self) -> PermissionState {
        self.permission
    }

    // ── Connection lifecycle ────────────────────────────────────────

    /// Mark connected and return the `join-room` request to send, if any.
    pub fn on_connected(&mut self) -> Option<ClientMessage> {
        self.connected = true;
        self.identity.as_ref().map(|identity| ClientMessage::join(identity.clone()))
    }

    /// Mark disconnected. Buffered events are kept.
    pub fn on_disconnected(&mut self) {
        self.connected = false;
        self.connection_id = None;
        self.room = None;
    }

    /// Whether the transport is up.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Id the server assigned to the current connection.
    pub fn connection_id(&self) -> Option<&ConnectionId> {
        self.connection_id.as_ref()
    }

    /// Room the server confirmed.
    pub fn room(&self) -> Option<&RoomKey> {
        self.room.as_ref()
    }

    /// When the last `pong` arrived. Informational only.
    pub fn last_pong(&self) -> Option<DateTime<Utc>> {
        self.last_pong
    }

    // ── Inbound frames ──────────────────────────────────────────────

    /// Apply a server frame.
    ///
    /// Returns the native notification the host should render, if any.
    pub fn apply(&mut self, message: ServerMessage) -> Option<NativeNotification> {
        match message {
            ServerMessage::ConnectionEstablished { connection_id } => {
                debug!(%connection_id, "connection established");
                self.connection_id = Some(connection_id);
                None
            }
            ServerMessage::Joined { room } => {
                debug!(%room, "joined room");
                self.room = Some(room);
                None
            }
            ServerMessage::Notification(event) => {
                let native = NativeNotification::for_notification(&event, self.permission);
                let _ = self.notifications.push(event);
                native
            }
            ServerMessage::GlobalAlert(alert) => {
                let native = NativeNotification::for_alert(&alert, self.permission);
                let _ = self.alerts.push(alert);
                native
            }
            ServerMessage::Pong { .. } => {
                self.last_pong = Some(Utc::now());
                None
            }
            ServerMessage::Error { code, message } => {
                warn!(%code, %message, "server rejected a frame");
                None
            }
        }
    }

    // ── Views ───────────────────────────────────────────────────────

    /// Notifications, newest first.
    pub fn notifications(&self) -> &BoundedBuffer<NotificationEvent> {
        &self.notifications
    }

    /// Alerts, newest first.
    pub fn alerts(&self) -> &BoundedBuffer<AlertEvent> {
        &self.alerts
    }

    /// Badge count: notifications plus alerts.
    pub fn total_count(&self) -> usize {
        self.notifications.len() + self.alerts.len()
    }

    // ── Dismissal ───────────────────────────────────────────────────

    /// Dismiss a notification. Returns `false` if it was not held.
    pub fn remove_notification(&mut self, id: &EventId) -> bool {
        self.notifications.remove(id).is_some()
    }

    /// Dismiss an alert. Returns `false` if it was not held.
    pub fn remove_alert(&mut self, id: &EventId) -> bool {
        self.alerts.remove(id).is_some()
    }

    /// Dismiss an entry from whichever buffer holds it.
    pub fn remove(&mut self, id: &EventId) -> bool {
        self.remove_notification(id) || self.remove_alert(id)
    }

    /// Drop every notification.
    pub fn clear_notifications(&mut self) {
        self.notifications.clear();
    }

    /// Drop every alert.
    pub fn clear_alerts(&mut self) {
        self.alerts.clear();
    }

    /// Drop both buffers.
    pub fn clear_all(&mut self) {
        self.clear_notifications();
        self.clear_alerts();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{AlertDraft, NotificationDraft};

    fn notification(title: &str) -> NotificationEvent {
        NotificationDraft {
            title: title.into(),
            message: "body".into(),
        }
        .into_event()
        .unwrap()
    }

    fn alert(severity: i64) -> AlertEvent {
        AlertDraft {
            kind: "vulnerability".into(),
            severity,
            title: format!("sev {severity}"),
            description: "desc".into(),
            source: "trivy".into(),
        }
        .into_event()
        .unwrap()
    }

    fn granted_store() -> NotificationStore {
        let mut store = NotificationStore::default();
        store.set_permission(PermissionState::Granted);
        store
    }

    #[test]
    fn connect_issues_join_with_identity() {
        let mut store = NotificationStore::default();
        store.set_identity(Some("a@x.com".into()));
        assert_eq!(store.on_connected(), Some(ClientMessage::join("a@x.com")));
        assert!(store.is_connected());
    }

    #[test]
    fn connect_without_identity_sends_nothing() {
        let mut store = NotificationStore::default();
        store.set_identity(Some("   ".into()));
        assert!(store.on_connected().is_none());
        assert!(store.is_connected());
    }

    #[test]
    fn notification_buffer_caps_at_fifty() {
        let mut store = NotificationStore::default();
        for n in 1..=51 {
            let _ = store.apply(ServerMessage::Notification(notification(&format!("n{n}"))));
        }
        assert_eq!(store.notifications().len(), 50);
        assert_eq!(store.notifications().latest().unwrap().title, "n51");
        assert!(store.notifications().iter().all(|n| n.title != "n1"));
    }

    #[test]
    fn alert_buffer_caps_at_ten() {
        let mut store = NotificationStore::default();
        for _ in 0..12 {
            let _ = store.apply(ServerMessage::GlobalAlert(alert(1)));
        }
        assert_eq!(store.alerts().len(), 10);
    }

    #[test]
    fn back_to_back_events_all_land() {
        let mut store = NotificationStore::default();
        let a = alert(3);
        let b = alert(4);
        let _ = store.apply(ServerMessage::GlobalAlert(a.clone()));
        let _ = store.apply(ServerMessage::GlobalAlert(b.clone()));
        let ids: Vec<_> = store.alerts().iter().map(|x| x.id.clone()).collect();
        assert_eq!(ids, [b.id, a.id]);
    }

    #[test]
    fn alert_escalation_follows_severity() {
        let mut store = granted_store();
        assert!(store.apply(ServerMessage::GlobalAlert(alert(5))).is_none());
        let high = store.apply(ServerMessage::GlobalAlert(alert(6))).unwrap();
        assert!(!high.require_interaction);
        let critical = store.apply(ServerMessage::GlobalAlert(alert(9))).unwrap();
        assert!(critical.require_interaction);
        assert_eq!(store.alerts().len(), 3);
    }

    #[test]
    fn no_escalation_without_permission() {
        let mut store = NotificationStore::default();
        assert!(store.apply(ServerMessage::GlobalAlert(alert(10))).is_none());
        assert!(store.apply(ServerMessage::Notification(notification("x"))).is_none());
        assert_eq!(store.total_count(), 2);
    }

    #[test]
    fn notification_escalates_when_granted() {
        let mut store = granted_store();
        let native = store
            .apply(ServerMessage::Notification(notification("Rule added")))
            .unwrap();
        assert_eq!(native.title, "Rule added");
        assert!(!native.require_interaction);
    }

    #[test]
    fn disconnect_retains_buffers() {
        let mut store = NotificationStore::default();
        let _ = store.on_connected();
        let _ = store.apply(ServerMessage::Joined {
            room: RoomKey::new("a@x.com").unwrap(),
        });
        for s in [2, 5, 9] {
            let _ = store.apply(ServerMessage::GlobalAlert(alert(s)));
        }
        let before: Vec<_> = store.alerts().iter().map(|a| a.id.clone()).collect();

        store.on_disconnected();
        assert!(!store.is_connected());
        assert!(store.room().is_none());

        let _ = store.on_connected();
        let after: Vec<_> = store.alerts().iter().map(|a| a.id.clone()).collect();
        assert_eq!(before, after);
        assert_eq!(after.len(), 3);
    }

    #[test]
    fn remove_dismisses_from_either_buffer() {
        let mut store = NotificationStore::default();
        let n = notification("n");
        let a = alert(7);
        let _ = store.apply(ServerMessage::Notification(n.clone()));
        let _ = store.apply(ServerMessage::GlobalAlert(a.clone()));

        assert!(store.remove(&a.id));
        assert!(!store.remove(&a.id));
        assert!(store.remove_notification(&n.id));
        assert!(!store.remove_alert(&n.id));
        assert_eq!(store.total_count(), 0);
    }

    #[test]
    fn dismissed_entry_never_resurfaces() {
        let mut store = NotificationStore::default();
        let a = alert(7);
        let _ = store.apply(ServerMessage::GlobalAlert(a.clone()));
        assert!(store.remove_alert(&a.id));
        for _ in 0..3 {
            let _ = store.apply(ServerMessage::GlobalAlert(alert(1)));
        }
        assert!(!store.alerts().contains(&a.id));
    }

    #[test]
    fn clear_variants() {
        let mut store = NotificationStore::default();
        let _ = store.apply(ServerMessage::Notification(notification("n")));
        let _ = store.apply(ServerMessage::GlobalAlert(alert(1)));

        store.clear_alerts();
        assert!(store.alerts().is_empty());
        assert_eq!(store.notifications().len(), 1);

        let _ = store.apply(ServerMessage::GlobalAlert(alert(1)));
        store.clear_notifications();
        assert!(store.notifications().is_empty());
        assert_eq!(store.alerts().len(), 1);

        store.clear_all();
        assert_eq!(store.total_count(), 0);
    }

    #[test]
    fn connection_frames_update_state() {
        let mut store = NotificationStore::default();
        let _ = store.apply(ServerMessage::ConnectionEstablished {
            connection_id: ConnectionId::from("conn_1"),
        });
        let _ = store.apply(ServerMessage::Pong { payload: None });
        assert_eq!(store.connection_id().unwrap().as_str(), "conn_1");
        assert!(store.last_pong().is_some());
        assert_eq!(store.total_count(), 0);
    }

    #[test]
    fn error_frame_changes_nothing() {
        let mut store = NotificationStore::default();
        let _ = store.on_connected();
        let out = store.apply(ServerMessage::Error {
            code: "PROTOCOL_ERROR".into(),
            message: "bad".into(),
        });
        assert!(out.is_none());
        assert!(store.is_connected());
    }

    #[test]
    fn from_settings_uses_capacities() {
        let settings = ClientSettings {
            notification_capacity: 2,
            alert_capacity: 1,
            identity: Some("ops@x.com".into()),
            ..ClientSettings::default()
        };
        let store = NotificationStore::from_settings(&settings);
        assert_eq!(store.notifications().capacity(), 2);
        assert_eq!(store.alerts().capacity(), 1);
        assert_eq!(store.identity(), Some("ops@x.com"));
    }
}
