//! Connection registry
//!
//! Maps a live connection to the room it is in. The room directory keeps the
//! reverse index; the coordinator updates both in the same step so they never
//! drift apart.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::id::ConnectionId;
use crate::room::RoomCode;

/// Per-connection record
#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    /// Room the connection has joined, if any
    pub room: Option<RoomCode>,

    /// When the connection was registered
    connected_at: Instant,
}

impl ConnectionEntry {
    fn new() -> Self {
        Self {
            room: None,
            connected_at: Instant::now(),
        }
    }

    /// How long the connection has been open
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Registry of live connections
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionEntry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted connection
    ///
    /// Returns false if the ID was already registered (the existing entry is kept).
    pub fn on_connect(&mut self, conn: ConnectionId) -> bool {
        if self.connections.contains_key(&conn) {
            return false;
        }
        self.connections.insert(conn, ConnectionEntry::new());
        true
    }

    /// Forget a connection
    ///
    /// Returns the removed entry so the caller can leave its room. Calling
    /// this again for the same connection returns `None`.
    pub fn on_disconnect(&mut self, conn: ConnectionId) -> Option<ConnectionEntry> {
        self.connections.remove(&conn)
    }

    /// Room the connection is currently in
    pub fn current_room(&self, conn: ConnectionId) -> Option<&RoomCode> {
        self.connections.get(&conn).and_then(|e| e.room.as_ref())
    }

    /// Record that the connection joined `code`. No-op for unknown connections.
    pub fn set_room(&mut self, conn: ConnectionId, code: RoomCode) {
        if let Some(entry) = self.connections.get_mut(&conn) {
            entry.room = Some(code);
        }
    }

    /// Record that the connection is no longer in a room
    pub fn clear_room(&mut self, conn: ConnectionId) -> Option<RoomCode> {
        self.connections
            .get_mut(&conn)
            .and_then(|entry| entry.room.take())
    }

    /// Check whether a connection is registered
    pub fn is_live(&self, conn: ConnectionId) -> bool {
        self.connections.contains_key(&conn)
    }

    /// Connections whose entry names `code`
    pub fn members_of(&self, code: &RoomCode) -> Vec<ConnectionId> {
        let mut members: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|(_, entry)| entry.room.as_ref() == Some(code))
            .map(|(id, _)| *id)
            .collect();
        members.sort_unstable();
        members
    }

    /// Number of connections that are in some room
    pub fn joined_count(&self) -> usize {
        self.connections
            .values()
            .filter(|entry| entry.room.is_some())
            .count()
    }

    /// Number of live connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> ConnectionId {
        ConnectionId::new(raw)
    }

    #[test]
    fn test_connect_disconnect() {
        let mut registry = ConnectionRegistry::new();

        assert!(registry.on_connect(id(1)));
        assert!(!registry.on_connect(id(1)));
        assert!(registry.is_live(id(1)));
        assert_eq!(registry.len(), 1);

        assert!(registry.on_disconnect(id(1)).is_some());
        assert!(!registry.is_live(id(1)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mut registry = ConnectionRegistry::new();
        registry.on_connect(id(1));
        registry.set_room(id(1), RoomCode::from("R1"));

        let entry = registry.on_disconnect(id(1)).unwrap();
        assert_eq!(entry.room, Some(RoomCode::from("R1")));

        assert!(registry.on_disconnect(id(1)).is_none());
        assert!(registry.on_disconnect(id(99)).is_none());
    }

    #[test]
    fn test_set_and_clear_room() {
        let mut registry = ConnectionRegistry::new();
        registry.on_connect(id(1));

        assert!(registry.current_room(id(1)).is_none());

        registry.set_room(id(1), RoomCode::from("R1"));
        assert_eq!(registry.current_room(id(1)), Some(&RoomCode::from("R1")));

        assert_eq!(registry.clear_room(id(1)), Some(RoomCode::from("R1")));
        assert!(registry.current_room(id(1)).is_none());
        assert!(registry.clear_room(id(1)).is_none());
    }

    #[test]
    fn test_set_room_unknown_connection() {
        let mut registry = ConnectionRegistry::new();
        registry.set_room(id(5), RoomCode::from("R1"));

        assert!(!registry.is_live(id(5)));
        assert!(registry.members_of(&RoomCode::from("R1")).is_empty());
    }

    #[test]
    fn test_members_of() {
        let mut registry = ConnectionRegistry::new();
        for raw in 1..=3 {
            registry.on_connect(id(raw));
        }
        registry.set_room(id(3), RoomCode::from("R1"));
        registry.set_room(id(1), RoomCode::from("R1"));
        registry.set_room(id(2), RoomCode::from("r1"));

        assert_eq!(registry.members_of(&RoomCode::from("R1")), vec![id(1), id(3)]);
        assert_eq!(registry.members_of(&RoomCode::from("r1")), vec![id(2)]);
    }
}
