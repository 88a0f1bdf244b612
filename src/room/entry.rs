//! Room entry
//!
//! This module defines the per-room state stored in the directory.

use std::collections::HashSet;

use super::config::RoomConfig;
use crate::chat::{ChatLog, ChatMessage};
use crate::connection::ConnectionId;

/// Entry for a single room in the directory
#[derive(Debug)]
pub struct RoomEntry {
    /// Connections currently in the room
    members: HashSet<ConnectionId>,

    /// Chat history for late joiners
    pub chat: ChatLog,
}

impl RoomEntry {
    pub(super) fn new(config: &RoomConfig) -> Self {
        Self {
            members: HashSet::new(),
            chat: ChatLog::with_limit(config.history_limit),
        }
    }

    pub(super) fn insert(&mut self, conn: ConnectionId) -> bool {
        self.members.insert(conn)
    }

    pub(super) fn remove(&mut self, conn: ConnectionId) -> bool {
        self.members.remove(&conn)
    }

    /// Members sorted by connection ID
    pub fn members(&self) -> Vec<ConnectionId> {
        let mut members: Vec<ConnectionId> = self.members.iter().copied().collect();
        members.sort_unstable();
        members
    }

    /// Members other than `conn`, sorted by connection ID
    pub fn members_except(&self, conn: ConnectionId) -> Vec<ConnectionId> {
        let mut members: Vec<ConnectionId> =
            self.members.iter().copied().filter(|m| *m != conn).collect();
        members.sort_unstable();
        members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Append a chat message to the room log
    pub fn record(&mut self, message: ChatMessage) {
        self.chat.push(message);
    }
}
