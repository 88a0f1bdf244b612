//! Chat log sink operations
//!
//! Recording and relaying are separate steps so persistence (done by the
//! caller, after the fact) can never hold up the live broadcast.

use super::message::ChatMessage;
use crate::connection::ConnectionId;
use crate::protocol::ServerEvent;
use crate::relay::{self, Delivery};
use crate::room::{RoomCode, RoomDirectory};

/// Append a message to a room's log
///
/// Returns false if the room does not exist.
pub fn record(directory: &mut RoomDirectory, code: &RoomCode, message: ChatMessage) -> bool {
    match directory.get_mut(code) {
        Some(entry) => {
            entry.record(message);
            true
        }
        None => false,
    }
}

/// History delivery for a connection that just joined `code`
pub fn replay_to(directory: &RoomDirectory, conn: ConnectionId, code: &RoomCode) -> Delivery {
    Delivery::to(conn, ServerEvent::ChatHistory(directory.history(code)))
}

/// Relay a freshly recorded message to the rest of the room
pub fn broadcast_new(
    directory: &RoomDirectory,
    code: &RoomCode,
    message: ChatMessage,
) -> Option<Delivery> {
    let sender = message.origin_connection_id;
    relay::broadcast_to_room(directory, code, ServerEvent::ChatMessage(message), Some(sender))
}
