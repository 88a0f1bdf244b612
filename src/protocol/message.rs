//! Client and server event types

use serde::Serialize;
use serde_json::value::RawValue;

use crate::chat::ChatMessage;
use crate::connection::ConnectionId;
use crate::room::RoomCode;

/// Event name constants, as they appear on the wire
pub mod names {
    pub const JOIN_CALL: &str = "join-call";
    pub const LEAVE_CALL: &str = "leave-call";
    pub const SIGNAL: &str = "signal";
    pub const CHAT_MESSAGE: &str = "chat-message";
}

/// Event sent by a client
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Join (or switch to) a room
    JoinCall { room_code: RoomCode },

    /// Leave the current room without disconnecting
    LeaveCall,

    /// Point-to-point handshake message for another connection
    Signal {
        to: ConnectionId,
        /// Opaque payload (offer/answer/candidate), kept byte-for-byte
        message: Box<RawValue>,
    },

    /// Chat message for the current room
    ChatMessage { body: String, sender_name: String },
}

impl ClientEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinCall { .. } => names::JOIN_CALL,
            ClientEvent::LeaveCall => names::LEAVE_CALL,
            ClientEvent::Signal { .. } => names::SIGNAL,
            ClientEvent::ChatMessage { .. } => names::CHAT_MESSAGE,
        }
    }
}

/// Event sent to a client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Tells a fresh connection its own ID
    #[serde(rename_all = "camelCase")]
    Connected { connection_id: ConnectionId },

    /// Acknowledges a join, listing the members already present
    #[serde(rename_all = "camelCase")]
    RoomJoined {
        room_code: RoomCode,
        members: Vec<ConnectionId>,
    },

    /// Another connection joined the room
    #[serde(rename_all = "camelCase")]
    UserJoined { connection_id: ConnectionId },

    /// Another connection left the room
    #[serde(rename_all = "camelCase")]
    UserLeft { connection_id: ConnectionId },

    /// Handshake message relayed from another connection
    #[serde(rename_all = "camelCase")]
    Signal {
        from_connection_id: ConnectionId,
        message: Box<RawValue>,
    },

    /// Live chat message
    ChatMessage(ChatMessage),

    /// Room history, oldest first
    ChatHistory(Vec<ChatMessage>),
}

impl ServerEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::RoomJoined { .. } => "room-joined",
            ServerEvent::UserJoined { .. } => "user-joined",
            ServerEvent::UserLeft { .. } => "user-left",
            ServerEvent::Signal { .. } => names::SIGNAL,
            ServerEvent::ChatMessage(_) => names::CHAT_MESSAGE,
            ServerEvent::ChatHistory(_) => "chat-history",
        }
    }
}
