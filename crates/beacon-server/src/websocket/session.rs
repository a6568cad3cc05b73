//! Transport session lifecycle: one client from upgrade through disconnect.
//!
//! [`TransportSession`] is the `connecting → open → closed` state machine;
//! [`run_ws_session`] drives it over an axum WebSocket.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use beacon_core::{BeaconError, ConnectionId, Result, RoomKey, ServerMessage};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::handler::handle_message;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_REJECTED_TOTAL,
    WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};
use crate::registry::{ConnectionRegistry, JoinOutcome};

/// How long the outbound writer may take to flush its close frame.
const OUTBOUND_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Shortest keepalive period; `tokio::time::interval` rejects zero.
const MIN_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle state of a [`TransportSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Handshake done, not yet registered.
    Connecting,
    /// Registered and eligible for delivery.
    Open,
    /// Deregistered. Terminal.
    Closed,
}

/// Registry-facing half of a client session.
///
/// Dropping the session closes it, so every exit path deregisters.
pub struct TransportSession {
    connection: Arc<ClientConnection>,
    registry: Arc<ConnectionRegistry>,
    state: Mutex<SessionState>,
}

impl TransportSession {
    /// Create a session in the `Connecting` state.
    pub fn new(connection: Arc<ClientConnection>, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            connection,
            registry,
            state: Mutex::new(SessionState::Connecting),
        }
    }

    /// Connection id.
    pub fn id(&self) -> &ConnectionId {
        &self.connection.id
    }

    /// Underlying connection.
    pub fn connection(&self) -> &Arc<ClientConnection> {
        &self.connection
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// `Connecting → Open`: register with no room.
    ///
    /// Returns `false` if the session was not `Connecting` or the registry
    /// refused the connection (duplicate id or at capacity).
    pub fn open(&self) -> bool {
        let mut state = self.state.lock();
        if *state != SessionState::Connecting {
            return false;
        }
        if !self.registry.register(Arc::clone(&self.connection)) {
            return false;
        }
        *state = SessionState::Open;
        true
    }

    /// `Open → Open`: join the room for `identity`, leaving any previous room.
    pub fn join(&self, identity: &str) -> Result<(RoomKey, JoinOutcome)> {
        let state = self.state.lock();
        if *state != SessionState::Open {
            return Err(BeaconError::UnknownConnection(self.connection.id.clone()));
        }
        let room = RoomKey::new(identity)
            .ok_or_else(|| BeaconError::invalid("identity", "must not be empty"))?;
        let outcome = self.registry.join(&self.connection.id, room.clone())?;
        Ok((room, outcome))
    }

    /// `* → Closed`: deregister. Returns `false` if already closed.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        if *state == SessionState::Closed {
            return false;
        }
        let was_open = *state == SessionState::Open;
        *state = SessionState::Closed;
        if was_open {
            let _ = self.registry.leave(&self.connection.id);
        }
        true
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Shared state every session needs.
#[derive(Clone)]
pub struct SessionContext {
    /// Registry sessions register with.
    pub registry: Arc<ConnectionRegistry>,
    /// Outbound queue capacity per connection.
    pub send_queue_capacity: usize,
    /// Interval between keepalive pings.
    pub keepalive_interval: Duration,
    /// Server shutdown signal.
    pub shutdown: CancellationToken,
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers with the registry (no room yet)
/// 2. Sends `connection-established` with the connection id
/// 3. Answers `join-room` and `ping` frames
/// 4. Forwards queued events and periodic keepalive pings
/// 5. Deregisters on disconnect or shutdown
#[instrument(skip_all, fields(connection_id = %connection_id))]
pub async fn run_ws_session(ws: WebSocket, connection_id: ConnectionId, ctx: SessionContext) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(ctx.send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(connection_id.clone(), send_tx));
    let session = TransportSession::new(Arc::clone(&connection), Arc::clone(&ctx.registry));
    if !session.open() {
        counter!(WS_CONNECTIONS_REJECTED_TOTAL).increment(1);
        let close = CloseFrame {
            code: close_code::AGAIN,
            reason: Utf8Bytes::from_static("connection refused"),
        };
        let _ = ws_tx.send(Message::Close(Some(close))).await;
        return;
    }

    // Written before the forwarder starts, so it precedes anything queued.
    let established = ServerMessage::ConnectionEstablished { connection_id };
    match established.encode() {
        Ok(json) => {
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                debug!("client went away before connection-established");
                return;
            }
        }
        Err(e) => {
            warn!(error = %e, "failed to encode connection-established");
            return;
        }
    }

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let stop = ctx.shutdown.child_token();
    let outbound_stop = stop.clone();
    let keepalive = ctx.keepalive_interval.max(MIN_KEEPALIVE_INTERVAL);
    let mut outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(keepalive);
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    let Some(frame) = frame else { break };
                    if ws_tx.send(Message::Text(String::clone(&frame).into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_stop.cancelled() => {
                    let close = CloseFrame {
                        code: close_code::AWAY,
                        reason: Utf8Bytes::from_static("session closed"),
                    };
                    let _ = ws_tx.send(Message::Close(Some(close))).await;
                    break;
                }
            }
        }
    });

    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            () = stop.cancelled() => {
                info!("closing session for shutdown");
                break;
            }
        };
        let Some(Ok(msg)) = msg else { break };

        let text = match msg {
            Message::Text(ref t) => Some(t.as_str().to_owned()),
            Message::Binary(ref data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    Some(s.to_owned())
                } else {
                    info!(len = data.len(), "ignoring non-UTF8 binary frame");
                    None
                }
            }
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => None,
        };
        let Some(text) = text else { continue };

        let reply = handle_message(&text, &session);
        match reply.encode() {
            Ok(json) => {
                if !connection.send(Arc::new(json)) {
                    info!("failed to enqueue reply (queue full or closed)");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode reply"),
        }
    }

    let _ = session.close();
    stop.cancel();
    if tokio::time::timeout(OUTBOUND_DRAIN_TIMEOUT, &mut outbound)
        .await
        .is_err()
    {
        outbound.abort();
    }

    info!(dropped = connection.drop_count(), "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
}
