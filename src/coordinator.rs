//! Room and signaling coordinator
//!
//! The coordinator is the single owner of both membership indexes (the
//! connection registry and the room directory) and the only thing that
//! mutates them. Every operation is a synchronous transition that returns the
//! [`Effects`] it produced: deliveries for the transport and chat messages for
//! the persistence collaborator. It never performs I/O itself.
//!
//! Ordering on join, as seen by the joiner:
//!
//! ```text
//! chat-history  ->  room-joined  ->  (live traffic)
//! ```
//!
//! and `user-joined` goes to the other members in the same transition.

use std::time::Instant;

use serde_json::value::RawValue;

use crate::chat::{self, ChatMessage, MessageClock};
use crate::connection::{ConnectionId, ConnectionRegistry};
use crate::protocol::{ClientEvent, ServerEvent};
use crate::relay::{self, Delivery};
use crate::room::{RoomCode, RoomConfig, RoomDirectory};
use crate::stats::{CoordinatorCounters, CoordinatorStats};

/// Output of one coordinator transition
#[derive(Debug, Default)]
pub struct Effects {
    /// Events to send, in order
    pub deliveries: Vec<Delivery>,
    /// Chat messages to hand to the persistence collaborator
    pub persist: Vec<(RoomCode, ChatMessage)>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, delivery: Option<Delivery>) {
        if let Some(delivery) = delivery {
            self.deliveries.push(delivery);
        }
    }

    fn extend(&mut self, other: Effects) {
        self.deliveries.extend(other.deliveries);
        self.persist.extend(other.persist);
    }

    /// Events addressed to `conn`, in delivery order
    pub fn events_for(&self, conn: ConnectionId) -> Vec<&ServerEvent> {
        self.deliveries
            .iter()
            .filter(|d| d.reaches(conn))
            .map(|d| &d.event)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty() && self.persist.is_empty()
    }
}

/// Coordinator state: who is connected, who is in which room
#[derive(Debug)]
pub struct Coordinator {
    connections: ConnectionRegistry,
    rooms: RoomDirectory,
    clock: MessageClock,
    counters: CoordinatorCounters,
    started_at: Instant,
}

impl Coordinator {
    /// Create a coordinator with default room configuration
    pub fn new() -> Self {
        Self::with_config(RoomConfig::default())
    }

    /// Create a coordinator with custom room configuration
    pub fn with_config(config: RoomConfig) -> Self {
        Self {
            connections: ConnectionRegistry::new(),
            rooms: RoomDirectory::with_config(config),
            clock: MessageClock::new(),
            counters: CoordinatorCounters::default(),
            started_at: Instant::now(),
        }
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn rooms(&self) -> &RoomDirectory {
        &self.rooms
    }

    /// Register a new transport connection and greet it with its ID
    pub fn connect(&mut self, conn: ConnectionId) -> Effects {
        let mut effects = Effects::new();

        if !self.connections.on_connect(conn) {
            tracing::warn!(connection = %conn, "Connection already registered");
            return effects;
        }
        self.counters.total_connections += 1;

        effects.push(Some(Delivery::to(
            conn,
            ServerEvent::Connected {
                connection_id: conn,
            },
        )));
        effects
    }

    /// Tear down a connection, leaving its room first
    ///
    /// Safe to call more than once; later calls produce nothing.
    pub fn disconnect(&mut self, conn: ConnectionId) -> Effects {
        let Some(entry) = self.connections.on_disconnect(conn) else {
            return Effects::new();
        };
        tracing::debug!(
            connection = %conn,
            duration = ?entry.duration(),
            "Connection unregistered"
        );

        match entry.room {
            Some(code) => self.leave_room(conn, &code),
            None => Effects::new(),
        }
    }

    /// Apply one client event
    ///
    /// `now_ms` is the arrival time used to stamp chat messages. Events from
    /// connections that are not registered are ignored.
    pub fn handle(&mut self, conn: ConnectionId, event: ClientEvent, now_ms: u64) -> Effects {
        if !self.connections.is_live(conn) {
            tracing::debug!(
                connection = %conn,
                event = event.name(),
                "Event from unknown connection"
            );
            return Effects::new();
        }

        match event {
            ClientEvent::JoinCall { room_code } => self.join(conn, room_code, None),
            ClientEvent::LeaveCall => self.leave(conn),
            ClientEvent::Signal { to, message } => self.signal(conn, to, message),
            ClientEvent::ChatMessage { body, sender_name } => {
                self.chat(conn, body, sender_name, now_ms)
            }
        }
    }

    /// Join `code`, leaving any other room first
    ///
    /// `history` seeds the room's chat log if, and only if, this join creates
    /// the room. Rejoining the current room only repeats the acknowledgement.
    pub fn join(
        &mut self,
        conn: ConnectionId,
        code: RoomCode,
        history: Option<Vec<ChatMessage>>,
    ) -> Effects {
        let mut effects = Effects::new();

        if !self.connections.is_live(conn) {
            return effects;
        }

        if let Some(current) = self.connections.current_room(conn).cloned() {
            if current != code {
                tracing::debug!(
                    connection = %conn,
                    from = %current,
                    to = %code,
                    "Switching rooms"
                );
                effects.extend(self.leave(conn));
            }
        }

        let outcome = self.rooms.join(&code, conn);
        if outcome.already_member {
            effects.push(Some(Delivery::to(
                conn,
                ServerEvent::RoomJoined {
                    room_code: code,
                    members: outcome.others,
                },
            )));
            return effects;
        }
        self.connections.set_room(conn, code.clone());

        if outcome.created {
            self.counters.rooms_created += 1;

            if let Some(history) = history {
                self.seed(&code, history);
            }
        }

        if self.rooms.config().replay_history {
            effects.push(Some(chat::sink::replay_to(&self.rooms, conn, &code)));
        }

        effects.push(Some(Delivery::to(
            conn,
            ServerEvent::RoomJoined {
                room_code: code.clone(),
                members: outcome.others,
            },
        )));

        effects.push(relay::broadcast_to_room(
            &self.rooms,
            &code,
            ServerEvent::UserJoined {
                connection_id: conn,
            },
            Some(conn),
        ));

        effects
    }

    /// Leave the current room, if any
    pub fn leave(&mut self, conn: ConnectionId) -> Effects {
        match self.connections.clear_room(conn) {
            Some(code) => self.leave_room(conn, &code),
            None => Effects::new(),
        }
    }

    /// Relay a handshake message to another connection
    pub fn signal(
        &mut self,
        from: ConnectionId,
        to: ConnectionId,
        message: Box<RawValue>,
    ) -> Effects {
        let mut effects = Effects::new();

        if !self.connections.is_live(from) {
            return effects;
        }

        match relay::forward(&self.connections, from, to, message) {
            Some(delivery) => {
                self.counters.signals_forwarded += 1;
                effects.push(Some(delivery));
            }
            None => self.counters.signals_dropped += 1,
        }

        effects
    }

    /// Record a chat message and relay it to the rest of the room
    pub fn chat(
        &mut self,
        conn: ConnectionId,
        body: String,
        sender: String,
        now_ms: u64,
    ) -> Effects {
        let mut effects = Effects::new();

        let Some(code) = self.connections.current_room(conn).cloned() else {
            tracing::debug!(connection = %conn, "Chat message outside a room, dropping");
            return effects;
        };

        let message = ChatMessage::new(body, sender, conn, self.clock.stamp(now_ms));
        chat::sink::record(&mut self.rooms, &code, message.clone());
        self.counters.chat_messages += 1;

        effects.push(chat::sink::broadcast_new(&self.rooms, &code, message.clone()));
        effects.persist.push((code, message));
        effects
    }

    /// Snapshot of coordinator statistics
    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats::new(
            self.connections.len(),
            self.rooms.room_count(),
            self.counters,
            self.started_at,
        )
    }

    /// Check that the registry and directory agree on every membership
    pub fn is_consistent(&self) -> bool {
        let codes = self.rooms.codes();

        let rooms_agree = codes
            .iter()
            .all(|code| self.rooms.members(code) == self.connections.members_of(code));

        let memberships: usize = codes.iter().map(|code| self.rooms.members(code).len()).sum();

        rooms_agree && memberships == self.connections.joined_count()
    }

    fn leave_room(&mut self, conn: ConnectionId, code: &RoomCode) -> Effects {
        let mut effects = Effects::new();
        let outcome = self.rooms.leave(code, conn);

        if outcome.removed && !outcome.room_closed {
            effects.push(Some(Delivery::new(
                outcome.remaining,
                ServerEvent::UserLeft {
                    connection_id: conn,
                },
            )));
        }

        effects
    }

    /// Fill a new room's log from stored history
    ///
    /// Stores are not trusted to return messages sorted. The clock moves past
    /// the newest stored stamp so new messages sort after it.
    fn seed(&mut self, code: &RoomCode, mut history: Vec<ChatMessage>) {
        history.sort_by_key(|m| m.timestamp);
        if let Some(newest) = history.last() {
            self.clock.observe(newest.timestamp);
        }
        if let Some(entry) = self.rooms.get_mut(code) {
            entry.chat.seed(history);
        }
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}
