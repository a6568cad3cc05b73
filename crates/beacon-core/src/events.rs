//! Event payloads pushed to clients.
//!
//! Producers never build [`NotificationEvent`] or [`AlertEvent`] directly.
//! They submit a draft, and `into_event` validates it and stamps the id and
//! timestamp, so a malformed payload is rejected before it reaches the
//! dispatcher and a built event is never edited afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{BeaconError, Result};
use crate::ids::EventId;

// ─────────────────────────────────────────────────────────────────────────────
// Severity
// ─────────────────────────────────────────────────────────────────────────────

/// Alert urgency on a 0–10 scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Severity(u8);

impl Severity {
    /// Highest representable severity.
    pub const MAX: u8 = 10;

    /// Build a severity, rejecting values outside 0–10.
    pub fn new(value: i64) -> Result<Self> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= Self::MAX)
            .map(Self)
            .ok_or_else(|| {
                BeaconError::invalid("severity", format!("must be between 0 and 10, got {value}"))
            })
    }

    /// Numeric value.
    pub fn value(self) -> u8 {
        self.0
    }

    /// Display tier.
    pub fn level(self) -> SeverityLevel {
        SeverityLevel::from(self)
    }
}

impl TryFrom<i64> for Severity {
    type Error = BeaconError;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Severity> for u8 {
    fn from(s: Severity) -> Self {
        s.0
    }
}

/// Coarse tiers used for rendering and log fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    /// 0–3.
    Low,
    /// 4–5.
    Medium,
    /// 6–7.
    High,
    /// 8–10.
    Critical,
}

impl From<Severity> for SeverityLevel {
    fn from(s: Severity) -> Self {
        match s.0 {
            8.. => Self::Critical,
            6..=7 => Self::High,
            4..=5 => Self::Medium,
            _ => Self::Low,
        }
    }
}

impl SeverityLevel {
    /// Lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Targeted event delivered to a single identity room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    /// Event identifier.
    pub id: EventId,
    /// Short heading.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

/// Broadcast event delivered to every live connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    /// Event identifier.
    pub id: EventId,
    /// Alert category, e.g. `falco`, `vulnerability`, `test`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Urgency.
    pub severity: Severity,
    /// Short heading.
    pub title: String,
    /// Details.
    pub description: String,
    /// Component that raised the alert.
    pub source: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Drafts
// ─────────────────────────────────────────────────────────────────────────────

fn require_text(field: &'static str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BeaconError::invalid(field, "must not be empty"));
    }
    Ok(trimmed.to_owned())
}

/// Producer-side notification payload awaiting validation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationDraft {
    /// Short heading.
    pub title: String,
    /// Body text (may be empty).
    #[serde(default)]
    pub message: String,
}

impl NotificationDraft {
    /// Validate and stamp the draft.
    pub fn into_event(self) -> Result<NotificationEvent> {
        Ok(NotificationEvent {
            id: EventId::new(),
            title: require_text("title", self.title)?,
            message: self.message,
            timestamp: Utc::now(),
        })
    }
}

/// Producer-side alert payload awaiting validation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AlertDraft {
    /// Alert category.
    #[serde(rename = "type")]
    pub kind: String,
    /// Raw severity, range-checked on conversion.
    pub severity: i64,
    /// Short heading.
    pub title: String,
    /// Details (may be empty).
    #[serde(default)]
    pub description: String,
    /// Component that raised the alert.
    pub source: String,
}

impl AlertDraft {
    /// Validate and stamp the draft.
    pub fn into_event(self) -> Result<AlertEvent> {
        Ok(AlertEvent {
            id: EventId::new(),
            kind: require_text("type", self.kind)?,
            severity: Severity::new(self.severity)?,
            title: require_text("title", self.title)?,
            description: self.description,
            source: require_text("source", self.source)?,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn alert_draft(severity: i64) -> AlertDraft {
        AlertDraft {
            kind: "falco".into(),
            severity,
            title: "Shell in container".into(),
            description: "bash spawned in nginx".into(),
            source: "falco".into(),
        }
    }

    #[test]
    fn severity_bounds() {
        assert_eq!(Severity::new(0).unwrap().value(), 0);
        assert_eq!(Severity::new(10).unwrap().value(), 10);
        assert!(Severity::new(11).is_err());
        assert!(Severity::new(-1).is_err());
        assert!(Severity::new(300).is_err());
    }

    #[test]
    fn severity_levels() {
        let level = |v| Severity::new(v).unwrap().level();
        assert_eq!(level(0), SeverityLevel::Low);
        assert_eq!(level(3), SeverityLevel::Low);
        assert_eq!(level(4), SeverityLevel::Medium);
        assert_eq!(level(5), SeverityLevel::Medium);
        assert_eq!(level(6), SeverityLevel::High);
        assert_eq!(level(7), SeverityLevel::High);
        assert_eq!(level(8), SeverityLevel::Critical);
        assert_eq!(level(10), SeverityLevel::Critical);
    }

    #[test]
    fn severity_rejects_out_of_range_json() {
        assert!(serde_json::from_str::<Severity>("11").is_err());
        assert_eq!(serde_json::from_str::<Severity>("7").unwrap().value(), 7);
    }

    #[test]
    fn alert_serializes_kind_as_type() {
        let alert = alert_draft(9).into_event().unwrap();
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["type"], "falco");
        assert_eq!(json["severity"], 9);
        assert!(json["timestamp"].is_string());
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn alert_draft_rejects_bad_severity() {
        let err = alert_draft(42).into_event().unwrap_err();
        assert!(matches!(err, BeaconError::InvalidPayload { field: "severity", .. }));
    }

    #[test]
    fn alert_draft_rejects_blank_title() {
        let mut draft = alert_draft(5);
        draft.title = "  ".into();
        let err = draft.into_event().unwrap_err();
        assert!(matches!(err, BeaconError::InvalidPayload { field: "title", .. }));
    }

    #[test]
    fn notification_draft_stamps_id_and_time() {
        let event = NotificationDraft {
            title: "Rule updated".into(),
            message: "falco rule 'shell' changed".into(),
        }
        .into_event()
        .unwrap();
        assert!(event.id.as_str().starts_with("evt_"));
        assert_eq!(event.title, "Rule updated");
    }

    #[test]
    fn notification_draft_rejects_empty_title() {
        let draft = NotificationDraft {
            title: String::new(),
            message: "x".into(),
        };
        assert!(draft.into_event().is_err());
    }

    proptest! {
        #[test]
        fn severity_accepts_exactly_zero_to_ten(v in -50i64..50) {
            prop_assert_eq!(Severity::new(v).is_ok(), (0..=10).contains(&v));
        }
    }
}
