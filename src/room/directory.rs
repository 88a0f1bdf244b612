//! Room directory implementation

use std::collections::HashMap;

use super::code::RoomCode;
use super::config::RoomConfig;
use super::entry::RoomEntry;
use crate::chat::ChatMessage;
use crate::connection::ConnectionId;

/// Result of [`RoomDirectory::join`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Other members at join time, sorted by connection ID
    pub others: Vec<ConnectionId>,
    /// The room did not exist before this join
    pub created: bool,
    /// The connection was already a member; nothing changed
    pub already_member: bool,
}

/// Result of [`RoomDirectory::leave`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LeaveOutcome {
    /// Members left behind, sorted by connection ID
    pub remaining: Vec<ConnectionId>,
    /// The connection was a member and has been removed
    pub removed: bool,
    /// The room became empty and was deleted
    pub room_closed: bool,
}

/// All rooms with at least one member
#[derive(Debug)]
pub struct RoomDirectory {
    rooms: HashMap<RoomCode, RoomEntry>,
    config: RoomConfig,
}

impl RoomDirectory {
    /// Create a directory with default configuration
    pub fn new() -> Self {
        Self::with_config(RoomConfig::default())
    }

    /// Create a directory with custom configuration
    pub fn with_config(config: RoomConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Add a connection to a room, creating the room if needed
    ///
    /// Joining a room the connection is already in changes nothing and
    /// reports `already_member`.
    pub fn join(&mut self, code: &RoomCode, conn: ConnectionId) -> JoinOutcome {
        let created = !self.rooms.contains_key(code);
        let entry = self
            .rooms
            .entry(code.clone())
            .or_insert_with(|| RoomEntry::new(&self.config));

        let others = entry.members_except(conn);
        let already_member = !entry.insert(conn);

        if created {
            tracing::info!(room = %code, connection = %conn, "Room created");
        } else if !already_member {
            tracing::debug!(
                room = %code,
                connection = %conn,
                members = entry.member_count(),
                "Member joined"
            );
        }

        JoinOutcome {
            others,
            created,
            already_member,
        }
    }

    /// Remove a connection from a room
    ///
    /// Silent no-op when the connection is not a member. Deletes the room,
    /// chat log included, once it is empty.
    pub fn leave(&mut self, code: &RoomCode, conn: ConnectionId) -> LeaveOutcome {
        let Some(entry) = self.rooms.get_mut(code) else {
            return LeaveOutcome::default();
        };

        if !entry.remove(conn) {
            return LeaveOutcome {
                remaining: entry.members(),
                removed: false,
                room_closed: false,
            };
        }

        if entry.is_empty() {
            self.rooms.remove(code);
            tracing::info!(room = %code, connection = %conn, "Room closed");
            return LeaveOutcome {
                remaining: Vec::new(),
                removed: true,
                room_closed: true,
            };
        }

        tracing::debug!(
            room = %code,
            connection = %conn,
            members = entry.member_count(),
            "Member left"
        );

        LeaveOutcome {
            remaining: entry.members(),
            removed: true,
            room_closed: false,
        }
    }

    /// Members of a room, sorted; empty if the room does not exist
    pub fn members(&self, code: &RoomCode) -> Vec<ConnectionId> {
        self.rooms
            .get(code)
            .map(RoomEntry::members)
            .unwrap_or_default()
    }

    /// Check if a room exists
    pub fn contains(&self, code: &RoomCode) -> bool {
        self.rooms.contains_key(code)
    }

    pub fn get_mut(&mut self, code: &RoomCode) -> Option<&mut RoomEntry> {
        self.rooms.get_mut(code)
    }

    /// Chat history of a room, oldest first
    pub fn history(&self, code: &RoomCode) -> Vec<ChatMessage> {
        self.rooms
            .get(code)
            .map(|entry| entry.chat.messages())
            .unwrap_or_default()
    }

    /// Codes of all open rooms, sorted
    pub fn codes(&self) -> Vec<RoomCode> {
        let mut codes: Vec<RoomCode> = self.rooms.keys().cloned().collect();
        codes.sort();
        codes
    }

    /// Get total number of rooms
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}
