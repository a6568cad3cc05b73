//! Producer HTTP endpoints.
//!
//! Bodies are parsed by hand so every rejection uses the same JSON error
//! shape. The dispatcher is resolved before the body is looked at, so a
//! server without one answers 503 regardless of payload.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use beacon_core::{AlertDraft, AlertEvent, BeaconError, EventId, NotificationDraft};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::server::AppState;

/// Default body of a manual test alert.
pub const TEST_ALERT_MESSAGE: &str = "Test alert";
/// Default severity of a manual test alert.
pub const TEST_ALERT_SEVERITY: i64 = 8;

/// Error response for producer endpoints.
#[derive(Debug)]
pub struct ApiError(pub BeaconError);

impl From<BeaconError> for ApiError {
    fn from(err: BeaconError) -> Self {
        Self(err)
    }
}

/// JSON body of an [`ApiError`].
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    /// Stable error code.
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

impl ApiError {
    /// HTTP status for the wrapped error.
    pub fn status(&self) -> StatusCode {
        match self.0 {
            BeaconError::DispatcherNotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            BeaconError::InvalidPayload { .. } | BeaconError::Protocol(_) => {
                StatusCode::BAD_REQUEST
            }
            BeaconError::UnknownConnection(_) => StatusCode::NOT_FOUND,
            BeaconError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(code = self.0.code(), error = %self.0, "producer request failed");
        }
        let body = ErrorBody {
            success: false,
            code: self.0.code().to_owned(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| BeaconError::invalid("body", e.to_string()).into())
}

fn parse_required<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| BeaconError::invalid("body", e.to_string()).into())
}

/// Body of `POST /api/alerts/test`. Every field is optional.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TestAlertRequest {
    /// Alert description.
    pub message: String,
    /// Alert severity, as a number or a numeric string.
    #[serde(deserialize_with = "integer_or_numeric_string")]
    pub severity: i64,
}

impl Default for TestAlertRequest {
    fn default() -> Self {
        Self {
            message: TEST_ALERT_MESSAGE.into(),
            severity: TEST_ALERT_SEVERITY,
        }
    }
}

impl TestAlertRequest {
    /// The alert draft a manual test produces.
    pub fn into_draft(self) -> AlertDraft {
        AlertDraft {
            kind: "test".into(),
            severity: self.severity,
            title: "Test Alert".into(),
            description: self.message,
            source: "Manual Test".into(),
        }
    }
}

/// Accepts `9` or `"9"`.
fn integer_or_numeric_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("`{text}` is not an integer"))),
    }
}

/// Response of `POST /api/alerts/test`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TestAlertResponse {
    /// Always `true`.
    pub success: bool,
    /// `"Test alert sent"`.
    pub message: String,
    /// The alert that was broadcast.
    pub alert: AlertEvent,
    /// Connections the alert was queued for.
    pub recipients: usize,
}

/// Response of the generic dispatch endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct DispatchResponse {
    /// Always `true`.
    pub success: bool,
    /// Id assigned to the event.
    pub event_id: EventId,
    /// Connections resolved as targets.
    pub recipients: usize,
    /// Connections whose queue accepted the event.
    pub delivered: usize,
}

/// Body of `POST /api/notifications`.
#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Identity room to target.
    pub room: String,
    /// Notification payload.
    #[serde(flatten)]
    pub draft: NotificationDraft,
}

/// `POST /api/alerts/test`
pub async fn test_alert(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TestAlertResponse>, ApiError> {
    let dispatcher = state.dispatcher.get()?;
    let request: TestAlertRequest = parse_body(&body)?;
    let (alert, report) = dispatcher.alert(request.into_draft())?;
    Ok(Json(TestAlertResponse {
        success: true,
        message: "Test alert sent".into(),
        alert,
        recipients: report.recipients,
    }))
}

/// `POST /api/alerts`
pub async fn broadcast_alert(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DispatchResponse>, ApiError> {
    let dispatcher = state.dispatcher.get()?;
    let draft: AlertDraft = parse_required(&body)?;
    let (alert, report) = dispatcher.alert(draft)?;
    Ok(Json(DispatchResponse {
        success: true,
        event_id: alert.id,
        recipients: report.recipients,
        delivered: report.delivered,
    }))
}

/// `POST /api/notifications`
pub async fn send_notification(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DispatchResponse>, ApiError> {
    let dispatcher = state.dispatcher.get()?;
    let request: NotificationRequest = parse_required(&body)?;
    let (event, report) = dispatcher.notify(&request.room, request.draft)?;
    Ok(Json(DispatchResponse {
        success: true,
        event_id: event.id,
        recipients: report.recipients,
        delivered: report.delivered,
    }))
}
