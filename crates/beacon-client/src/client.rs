//! Reconnecting WebSocket driver that feeds a [`NotificationStore`].
//!
//! Each (re)connect sends `join-room` with the configured identity and one
//! advisory `ping`. On disconnect the store is marked offline but keeps its
//! buffers, and the driver retries with exponential backoff until cancelled.

use std::sync::Arc;
use std::time::Duration;

use beacon_core::{ClientMessage, ServerMessage};
use beacon_settings::ClientSettings;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rand::Rng;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::escalation::NativeNotifier;
use crate::store::NotificationStore;

/// Capacity of the [`ClientEvent`] channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Client-side failures. None of them reach the store's buffers.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The WebSocket handshake failed.
    #[error("connect failed: {0}")]
    Connect(#[source] tungstenite::Error),
    /// Reading or writing an established socket failed.
    #[error("transport error: {0}")]
    Transport(#[source] tungstenite::Error),
    /// The server closed the connection.
    #[error("connection closed by server")]
    Closed,
}

/// Reconnect backoff parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReconnectPolicy {
    /// First delay in milliseconds.
    pub base_delay_ms: u64,
    /// Delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter factor 0.0–1.0, applied symmetrically.
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&ClientSettings::default())
    }
}

impl From<&ClientSettings> for ReconnectPolicy {
    fn from(s: &ClientSettings) -> Self {
        Self {
            base_delay_ms: s.reconnect_base_delay_ms,
            max_delay_ms: s.reconnect_max_delay_ms,
            jitter: s.reconnect_jitter,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect `attempt` (zero-based).
    ///
    /// `min(max, base * 2^attempt)` scaled by `1 ± jitter`, where `random`
    /// in `[0, 1)` picks the point in the jitter range.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay(&self, attempt: u32, random: f64) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(31));
        let capped = exponential.min(self.max_delay_ms) as f64;
        let jitter = self.jitter.clamp(0.0, 1.0);
        let factor = 1.0 + (random.clamp(0.0, 1.0) * 2.0 - 1.0) * jitter;
        Duration::from_millis((capped * factor).round().max(0.0) as u64)
    }

    /// [`Self::delay`] with thread-local randomness.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        self.delay(attempt, rand::rng().random::<f64>())
    }
}

/// Lifecycle and traffic observed by a [`NotificationClient`].
#[derive(Clone, Debug)]
pub enum ClientEvent {
    /// Socket established.
    Connected,
    /// A server frame was applied to the store.
    Received(ServerMessage),
    /// Socket lost; a reconnect follows unless cancelled.
    Disconnected {
        /// Delay before the next attempt.
        retry_in: Duration,
    },
}

/// Reconnecting notification client.
pub struct NotificationClient {
    url: String,
    policy: ReconnectPolicy,
    store: Arc<Mutex<NotificationStore>>,
    notifier: Arc<dyn NativeNotifier>,
    cancel: CancellationToken,
    events: broadcast::Sender<ClientEvent>,
}

impl NotificationClient {
    /// Create a client for `url` feeding `store`.
    pub fn new(
        url: impl Into<String>,
        store: Arc<Mutex<NotificationStore>>,
        notifier: Arc<dyn NativeNotifier>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            url: url.into(),
            policy: ReconnectPolicy::default(),
            store,
            notifier,
            cancel: CancellationToken::new(),
            events,
        }
    }

    /// Create a client, store and policy from settings.
    pub fn from_settings(settings: &ClientSettings, notifier: Arc<dyn NativeNotifier>) -> Self {
        let store = Arc::new(Mutex::new(NotificationStore::from_settings(settings)));
        Self::new(settings.server_url.clone(), store, notifier)
            .with_policy(ReconnectPolicy::from(settings))
    }

    /// Override the reconnect policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shared store.
    pub fn store(&self) -> &Arc<Mutex<NotificationStore>> {
        &self.store
    }

    /// Token that stops [`Self::run`].
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Subscribe to lifecycle and traffic events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Connect and reconnect until cancelled.
    pub async fn run(&self) {
        let mut attempt: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            match self.run_once().await {
                Ok(()) => return,
                Err(ClientError::Connect(e)) => {
                    warn!(url = %self.url, attempt, error = %e, "connect failed");
                }
                Err(e) => {
                    attempt = 0;
                    warn!(error = %e, "connection lost");
                }
            }

            let retry_in = self.policy.jittered_delay(attempt);
            attempt = attempt.saturating_add(1);
            let _ = self.events.send(ClientEvent::Disconnected { retry_in });
            debug!(?retry_in, attempt, "reconnecting");
            tokio::select! {
                () = tokio::time::sleep(retry_in) => {}
                () = self.cancel.cancelled() => return,
            }
        }
    }

    /// One connection, from handshake until the socket ends or cancellation.
    ///
    /// Returns `Ok(())` only when the client was cancelled.
    #[instrument(skip_all, fields(url = %self.url))]
    pub async fn run_once(&self) -> Result<(), ClientError> {
        let (ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(ClientError::Connect)?;
        let join = {
            let mut store = self.store.lock();
            store.set_permission(self.notifier.permission());
            store.on_connected()
        };
        info!("connected");
        let _ = self.events.send(ClientEvent::Connected);

        let result = self.pump(ws, join).await;

        self.store.lock().on_disconnected();
        info!("disconnected");
        result
    }

    async fn pump(&self, ws: WsStream, join: Option<ClientMessage>) -> Result<(), ClientError> {
        let (mut tx, mut rx) = ws.split();
        if let Some(join) = join {
            send(&mut tx, &join).await?;
        }
        send(&mut tx, &ClientMessage::Ping { payload: None }).await?;

        loop {
            let msg = tokio::select! {
                msg = rx.next() => msg,
                () = self.cancel.cancelled() => {
                    let _ = tx.send(Message::Close(None)).await;
                    return Ok(());
                }
            };
            match msg {
                None | Some(Ok(Message::Close(_))) => return Err(ClientError::Closed),
                Some(Err(e)) => return Err(ClientError::Transport(e)),
                Some(Ok(Message::Text(text))) => self.handle_frame(&text),
                Some(Ok(Message::Binary(data))) => {
                    if let Ok(text) = std::str::from_utf8(&data) {
                        self.handle_frame(text);
                    }
                }
                Some(Ok(_)) => {}
            }
        }
    }

    fn handle_frame(&self, text: &str) {
        let message = match ServerMessage::decode(text) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "undecodable server frame");
                return;
            }
        };
        let native = self.store.lock().apply(message.clone());
        if let Some(native) = native {
            self.notifier.show(&native);
        }
        let _ = self.events.send(ClientEvent::Received(message));
    }
}

async fn send<S>(tx: &mut S, message: &ClientMessage) -> Result<(), ClientError>
where
    S: futures::Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let json = match message.encode() {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to encode client frame");
            return Ok(());
        }
    };
    tx.send(Message::text(json))
        .await
        .map_err(ClientError::Transport)
}
