//! Native-notification escalation policy and the host rendering seam.
//!
//! The store only decides whether to raise an OS-level notification and
//! whether it needs explicit dismissal. Rendering belongs to the host through
//! [`NativeNotifier`].

use beacon_core::{AlertEvent, NotificationEvent, Severity};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Lowest alert severity that raises a native notification.
pub const ESCALATE_SEVERITY: u8 = 6;
/// Lowest alert severity whose native notification needs explicit dismissal.
pub const REQUIRE_INTERACTION_SEVERITY: u8 = 8;

/// Host permission to show native notifications.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    /// Not yet asked.
    #[default]
    Default,
    /// Allowed.
    Granted,
    /// Refused.
    Denied,
}

impl PermissionState {
    /// Whether native notifications may be shown.
    pub fn is_granted(self) -> bool {
        self == Self::Granted
    }
}

/// Outcome of the escalation policy for one event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EscalationDecision {
    /// Raise a native notification.
    pub should_escalate: bool,
    /// The notification stays until dismissed.
    pub require_interaction: bool,
}

impl EscalationDecision {
    /// Decision for a broadcast alert.
    pub fn for_alert(severity: Severity, permission: PermissionState) -> Self {
        let value = severity.value();
        let should_escalate = permission.is_granted() && value >= ESCALATE_SEVERITY;
        Self {
            should_escalate,
            require_interaction: should_escalate && value >= REQUIRE_INTERACTION_SEVERITY,
        }
    }

    /// Decision for a targeted notification: shown when permitted, never sticky.
    pub fn for_notification(permission: PermissionState) -> Self {
        Self {
            should_escalate: permission.is_granted(),
            require_interaction: false,
        }
    }
}

/// A native notification the host should render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NativeNotification {
    /// Heading.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Event id, for de-duplication by the host.
    pub tag: String,
    /// Stay on screen until dismissed.
    pub require_interaction: bool,
}

impl NativeNotification {
    /// Native notification for `alert`, if policy escalates it.
    pub fn for_alert(alert: &AlertEvent, permission: PermissionState) -> Option<Self> {
        let decision = EscalationDecision::for_alert(alert.severity, permission);
        decision.should_escalate.then(|| Self {
            title: alert.title.clone(),
            body: alert.description.clone(),
            tag: alert.id.to_string(),
            require_interaction: decision.require_interaction,
        })
    }

    /// Native notification for `event`, if policy escalates it.
    pub fn for_notification(event: &NotificationEvent, permission: PermissionState) -> Option<Self> {
        let decision = EscalationDecision::for_notification(permission);
        decision.should_escalate.then(|| Self {
            title: event.title.clone(),
            body: event.message.clone(),
            tag: event.id.to_string(),
            require_interaction: false,
        })
    }
}

/// Host environment that renders native notifications.
pub trait NativeNotifier: Send + Sync {
    /// Current permission.
    fn permission(&self) -> PermissionState;

    /// Render `notification`.
    fn show(&self, notification: &NativeNotification);
}

/// Notifier that writes escalations to the log.
///
/// Used by terminal hosts that have no desktop notification surface.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl NativeNotifier for LogNotifier {
    fn permission(&self) -> PermissionState {
        PermissionState::Granted
    }

    fn show(&self, notification: &NativeNotification) {
        info!(
            title = %notification.title,
            tag = %notification.tag,
            require_interaction = notification.require_interaction,
            "native notification"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::AlertDraft;

    fn alert(severity: i64) -> AlertEvent {
        AlertDraft {
            kind: "falco".into(),
            severity,
            title: "Terminal shell in container".into(),
            description: "bash in nginx-7f9c".into(),
            source: "falco".into(),
        }
        .into_event()
        .unwrap()
    }

    #[test]
    fn severity_bands_with_permission() {
        let granted = PermissionState::Granted;
        for s in 0..=5 {
            let d = EscalationDecision::for_alert(Severity::new(s).unwrap(), granted);
            assert!(!d.should_escalate, "severity {s} must not escalate");
            assert!(!d.require_interaction);
        }
        for s in 6..=7 {
            let d = EscalationDecision::for_alert(Severity::new(s).unwrap(), granted);
            assert!(d.should_escalate, "severity {s} must escalate");
            assert!(!d.require_interaction, "severity {s} must not require interaction");
        }
        for s in 8..=10 {
            let d = EscalationDecision::for_alert(Severity::new(s).unwrap(), granted);
            assert!(d.should_escalate);
            assert!(d.require_interaction, "severity {s} must require interaction");
        }
    }

    #[test]
    fn no_permission_never_escalates() {
        for permission in [PermissionState::Default, PermissionState::Denied] {
            for s in 0..=10 {
                let d = EscalationDecision::for_alert(Severity::new(s).unwrap(), permission);
                assert_eq!(d, EscalationDecision::default());
            }
            assert!(!EscalationDecision::for_notification(permission).should_escalate);
        }
    }

    #[test]
    fn notification_is_never_sticky() {
        let d = EscalationDecision::for_notification(PermissionState::Granted);
        assert!(d.should_escalate);
        assert!(!d.require_interaction);
    }

    #[test]
    fn native_alert_carries_fields() {
        let a = alert(9);
        let n = NativeNotification::for_alert(&a, PermissionState::Granted).unwrap();
        assert_eq!(n.title, a.title);
        assert_eq!(n.body, a.description);
        assert_eq!(n.tag, a.id.as_str());
        assert!(n.require_interaction);
        assert!(NativeNotification::for_alert(&alert(4), PermissionState::Granted).is_none());
    }

    #[test]
    fn permission_serde() {
        let json = serde_json::to_string(&PermissionState::Granted).unwrap();
        assert_eq!(json, r#""granted""#);
    }
}
