//! Connection registry: live connections and identity-room membership.
//!
//! A connection belongs to at most one room. Joining a different room moves
//! it; joining the same room again is a no-op. Rooms exist only while they
//! have members.
//!
//! All state sits behind one lock, and frames are queued while the read lock
//! is held. A `leave` racing a delivery therefore either runs after the frame
//! was queued or before the connection was resolved, never in between.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use beacon_core::{BeaconError, ConnectionId, Result, RoomKey};
use metrics::counter;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::metrics::DELIVERIES_DROPPED_TOTAL;
use crate::websocket::connection::ClientConnection;

/// Outcome of [`ConnectionRegistry::join`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The connection had no room and now has one.
    Joined,
    /// The connection was already in this room.
    AlreadyMember,
    /// The connection left `previous` for the requested room.
    Moved {
        /// Room the connection was in before.
        previous: RoomKey,
    },
}

/// Result of fanning a frame out to a set of connections.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Connections resolved as targets.
    pub recipients: usize,
    /// Frames accepted by a connection queue.
    pub delivered: usize,
}

impl DeliveryReport {
    /// Targets whose queue rejected the frame.
    pub fn dropped(&self) -> usize {
        self.recipients - self.delivered
    }
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<ConnectionId, Arc<ClientConnection>>,
    rooms: HashMap<RoomKey, HashSet<ConnectionId>>,
    membership: HashMap<ConnectionId, RoomKey>,
}

impl RegistryState {
    fn remove_membership(&mut self, id: &ConnectionId) -> Option<RoomKey> {
        let room = self.membership.remove(id)?;
        if let Some(members) = self.rooms.get_mut(&room) {
            let _ = members.remove(id);
            if members.is_empty() {
                let _ = self.rooms.remove(&room);
            }
        }
        Some(room)
    }
}

/// Registry of live connections, shared by sessions and the dispatcher.
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,
    max_connections: usize,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::with_max_connections(usize::MAX)
    }
}

impl ConnectionRegistry {
    /// Create an empty, unbounded registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry that holds at most `max` live connections.
    pub fn with_max_connections(max: usize) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            max_connections: max,
        }
    }

    /// Connection cap enforced by [`Self::register`].
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Register a live connection with no room.
    ///
    /// Returns `false` if a connection with the same id is already present or
    /// the registry is at capacity. The cap is checked under the write lock.
    pub fn register(&self, connection: Arc<ClientConnection>) -> bool {
        let mut state = self.state.write();
        if state.connections.contains_key(&connection.id) {
            warn!(connection_id = %connection.id, "connection id already registered");
            return false;
        }
        if state.connections.len() >= self.max_connections {
            warn!(
                connection_id = %connection.id,
                max = self.max_connections,
                "connection limit reached"
            );
            return false;
        }
        let _ = state.connections.insert(connection.id.clone(), connection);
        true
    }

    /// Put `id` in `room`, replacing any previous membership.
    pub fn join(&self, id: &ConnectionId, room: RoomKey) -> Result<JoinOutcome> {
        let mut state = self.state.write();
        if !state.connections.contains_key(id) {
            return Err(BeaconError::UnknownConnection(id.clone()));
        }
        if state.membership.get(id) == Some(&room) {
            return Ok(JoinOutcome::AlreadyMember);
        }
        let previous = state.remove_membership(id);
        let _ = state
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(id.clone());
        let _ = state.membership.insert(id.clone(), room);
        Ok(match previous {
            Some(previous) => JoinOutcome::Moved { previous },
            None => JoinOutcome::Joined,
        })
    }

    /// Remove `id` from its room and from the live set.
    ///
    /// Returns `true` if the connection was registered. Calling it again is a
    /// no-op.
    pub fn leave(&self, id: &ConnectionId) -> bool {
        let mut state = self.state.write();
        let _ = state.remove_membership(id);
        state.connections.remove(id).is_some()
    }

    /// Current members of `room`; empty when the room has none.
    pub fn members_of(&self, room: &RoomKey) -> HashSet<ConnectionId> {
        self.state.read().rooms.get(room).cloned().unwrap_or_default()
    }

    /// Room `id` currently belongs to.
    pub fn room_of(&self, id: &ConnectionId) -> Option<RoomKey> {
        self.state.read().membership.get(id).cloned()
    }

    /// Whether `id` is a live connection.
    pub fn is_registered(&self, id: &ConnectionId) -> bool {
        self.state.read().connections.contains_key(id)
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.state.read().connections.len()
    }

    /// Number of rooms with at least one member.
    pub fn room_count(&self) -> usize {
        self.state.read().rooms.len()
    }

    /// Queue `frame` on every member of `room`.
    pub fn deliver_to_room(&self, room: &RoomKey, frame: &Arc<String>) -> DeliveryReport {
        let state = self.state.read();
        let Some(members) = state.rooms.get(room) else {
            return DeliveryReport::default();
        };
        let targets = members.iter().filter_map(|id| state.connections.get(id));
        fan_out(targets, frame, room.as_str())
    }

    /// Queue `frame` on every live connection.
    pub fn deliver_to_all(&self, frame: &Arc<String>) -> DeliveryReport {
        let state = self.state.read();
        fan_out(state.connections.values(), frame, "all")
    }
}

fn fan_out<'a>(
    targets: impl Iterator<Item = &'a Arc<ClientConnection>>,
    frame: &Arc<String>,
    label: &str,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    for conn in targets {
        report.recipients += 1;
        if conn.send(Arc::clone(frame)) {
            report.delivered += 1;
        } else {
            counter!(DELIVERIES_DROPPED_TOTAL).increment(1);
            warn!(connection_id = %conn.id, label, drops = conn.drop_count(), "dropped frame for connection");
        }
    }
    debug!(label, recipients = report.recipients, delivered = report.delivered, "fan-out complete");
    report
}
