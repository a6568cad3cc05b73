//! Inbound frame handling: decodes a client frame and produces the reply.

use beacon_core::{ClientMessage, ServerMessage};
use metrics::counter;
use tracing::{debug, info, instrument, warn};

use super::session::TransportSession;
use crate::metrics::ROOM_JOINS_TOTAL;
use crate::registry::JoinOutcome;

/// Handle one text frame from the client.
///
/// Every frame gets exactly one reply. Undecodable frames and rejected joins
/// produce an `error` frame and leave the session open.
#[instrument(skip_all, fields(connection_id = %session.id()))]
pub fn handle_message(text: &str, session: &TransportSession) -> ServerMessage {
    let message = match ClientMessage::decode(text) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, len = text.len(), "undecodable client frame");
            return ServerMessage::error(&e);
        }
    };

    match message {
        ClientMessage::JoinRoom { identity } => match session.join(&identity) {
            Ok((room, outcome)) => {
                match &outcome {
                    JoinOutcome::Joined => info!(%room, "joined room"),
                    JoinOutcome::Moved { previous } => info!(%room, %previous, "moved room"),
                    JoinOutcome::AlreadyMember => debug!(%room, "already in room"),
                }
                counter!(ROOM_JOINS_TOTAL).increment(1);
                ServerMessage::Joined { room }
            }
            Err(e) => {
                warn!(error = %e, "join rejected");
                ServerMessage::error(&e)
            }
        },
        ClientMessage::Ping { payload } => ServerMessage::Pong { payload },
    }
}
