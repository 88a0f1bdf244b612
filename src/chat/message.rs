//! Chat message type and arrival clock

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionId;

/// A chat message as recorded by the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Message text
    pub body: String,
    /// Display name of the sender, as supplied by the client
    pub sender: String,
    /// Connection the message arrived on
    pub origin_connection_id: ConnectionId,
    /// Arrival time in milliseconds since the UNIX epoch
    pub timestamp: u64,
}

impl ChatMessage {
    pub fn new(
        body: impl Into<String>,
        sender: impl Into<String>,
        origin: ConnectionId,
        timestamp: u64,
    ) -> Self {
        Self {
            body: body.into(),
            sender: sender.into(),
            origin_connection_id: origin,
            timestamp,
        }
    }
}

/// Stamps messages with strictly increasing arrival times
///
/// Client clocks are never consulted. If the wall clock stalls or steps
/// backwards, the previous stamp plus one is used.
#[derive(Debug, Default, Clone)]
pub struct MessageClock {
    last: u64,
}

impl MessageClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the stamp for a message arriving at `now_ms`
    pub fn stamp(&mut self, now_ms: u64) -> u64 {
        let ts = if now_ms > self.last {
            now_ms
        } else {
            self.last + 1
        };
        self.last = ts;
        ts
    }

    /// Make sure future stamps sort after `ts`
    pub fn observe(&mut self, ts: u64) {
        self.last = self.last.max(ts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_follows_wall_clock() {
        let mut clock = MessageClock::new();
        assert_eq!(clock.stamp(1000), 1000);
        assert_eq!(clock.stamp(1500), 1500);
    }

    #[test]
    fn test_clock_never_repeats() {
        let mut clock = MessageClock::new();
        assert_eq!(clock.stamp(1000), 1000);
        assert_eq!(clock.stamp(1000), 1001);
        assert_eq!(clock.stamp(900), 1002);
    }

    #[test]
    fn test_clock_observe() {
        let mut clock = MessageClock::new();
        clock.observe(5000);
        assert_eq!(clock.stamp(10), 5001);
    }

    #[test]
    fn test_wire_field_names() {
        let msg = ChatMessage::new("hi", "Bob", ConnectionId::new(2), 77);
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "body": "hi",
                "sender": "Bob",
                "originConnectionId": 2,
                "timestamp": 77,
            })
        );
    }
}
