//! Outbound delivery type

use crate::connection::ConnectionId;
use crate::protocol::ServerEvent;

/// One event addressed to one or more connections
///
/// This is designed to be encoded once per delivery, not once per recipient.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Connections that should receive the event
    pub recipients: Vec<ConnectionId>,
    /// Event to send
    pub event: ServerEvent,
}

impl Delivery {
    pub fn new(recipients: Vec<ConnectionId>, event: ServerEvent) -> Self {
        Self { recipients, event }
    }

    /// Delivery to a single connection
    pub fn to(conn: ConnectionId, event: ServerEvent) -> Self {
        Self {
            recipients: vec![conn],
            event,
        }
    }

    /// Check whether `conn` is a recipient
    pub fn reaches(&self, conn: ConnectionId) -> bool {
        self.recipients.contains(&conn)
    }
}
