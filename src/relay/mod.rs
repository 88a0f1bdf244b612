//! Signaling relay
//!
//! Pure routing: the relay decides *who* gets an event, never what the event
//! means. Handshake payloads pass through as raw JSON. The transport encodes
//! each [`Delivery`] once and shares the frame among its recipients.
//!
//! ```text
//!   forward(A -> B, payload)          broadcast_to_room(R1, event, except A)
//!          │                                     │
//!          ▼                                     ▼
//!   Delivery { [B], signal(A, payload) }  Delivery { [B, C, ...], event }
//! ```

pub mod delivery;

pub use delivery::Delivery;

use serde_json::value::RawValue;

use crate::connection::{ConnectionId, ConnectionRegistry};
use crate::protocol::ServerEvent;
use crate::room::{RoomCode, RoomDirectory};

/// Relay a handshake message to a single connection
///
/// Returns `None` when `to` is not a live connection. The message is dropped
/// in that case; the peer's WebRTC stack times out and renegotiates.
pub fn forward(
    registry: &ConnectionRegistry,
    from: ConnectionId,
    to: ConnectionId,
    payload: Box<RawValue>,
) -> Option<Delivery> {
    if !registry.is_live(to) {
        tracing::debug!(from = %from, to = %to, "Signal target not connected, dropping");
        return None;
    }

    Some(Delivery::to(
        to,
        ServerEvent::Signal {
            from_connection_id: from,
            message: payload,
        },
    ))
}

/// Deliver an event to every member of a room, optionally skipping one
///
/// Returns `None` when nobody would receive it.
pub fn broadcast_to_room(
    directory: &RoomDirectory,
    code: &RoomCode,
    event: ServerEvent,
    excluding: Option<ConnectionId>,
) -> Option<Delivery> {
    let recipients: Vec<ConnectionId> = directory
        .members(code)
        .into_iter()
        .filter(|member| Some(*member) != excluding)
        .collect();

    if recipients.is_empty() {
        return None;
    }

    Some(Delivery::new(recipients, event))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> ConnectionId {
        ConnectionId::new(raw)
    }

    fn payload(text: &str) -> Box<RawValue> {
        RawValue::from_string(text.to_owned()).unwrap()
    }

    #[test]
    fn test_forward_to_live_connection() {
        let mut registry = ConnectionRegistry::new();
        registry.on_connect(id(1));
        registry.on_connect(id(2));

        let delivery = forward(&registry, id(1), id(2), payload(r#"{"type":"offer","offer":"x"}"#))
            .expect("target is live");

        assert_eq!(delivery.recipients, vec![id(2)]);
        match delivery.event {
            ServerEvent::Signal {
                from_connection_id,
                message,
            } => {
                assert_eq!(from_connection_id, id(1));
                assert_eq!(message.get(), r#"{"type":"offer","offer":"x"}"#);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_forward_to_gone_connection_is_dropped() {
        let mut registry = ConnectionRegistry::new();
        registry.on_connect(id(1));
        registry.on_connect(id(2));
        registry.on_disconnect(id(2));

        assert!(forward(&registry, id(1), id(2), payload("{}")).is_none());
        assert!(forward(&registry, id(1), id(77), payload("{}")).is_none());
    }

    #[test]
    fn test_broadcast_excludes_sender() {
        let mut directory = RoomDirectory::new();
        let code = RoomCode::from("R1");
        for raw in 1..=3 {
            directory.join(&code, id(raw));
        }

        let delivery = broadcast_to_room(
            &directory,
            &code,
            ServerEvent::UserJoined { connection_id: id(2) },
            Some(id(2)),
        )
        .unwrap();

        assert_eq!(delivery.recipients, vec![id(1), id(3)]);
    }

    #[test]
    fn test_broadcast_without_exclusion() {
        let mut directory = RoomDirectory::new();
        let code = RoomCode::from("R1");
        directory.join(&code, id(1));
        directory.join(&code, id(2));

        let delivery = broadcast_to_room(
            &directory,
            &code,
            ServerEvent::UserLeft { connection_id: id(5) },
            None,
        )
        .unwrap();

        assert_eq!(delivery.recipients, vec![id(1), id(2)]);
    }

    #[test]
    fn test_broadcast_to_empty_audience() {
        let mut directory = RoomDirectory::new();
        let code = RoomCode::from("R1");
        directory.join(&code, id(1));

        let event = ServerEvent::UserJoined { connection_id: id(1) };
        assert!(broadcast_to_room(&directory, &code, event.clone(), Some(id(1))).is_none());
        assert!(broadcast_to_room(&directory, &RoomCode::from("none"), event, None).is_none());
    }
}
