//! Wire protocol
//!
//! Every WebSocket text frame carries one JSON envelope:
//!
//! ```text
//! { "event": "<name>", "data": <payload> }
//! ```
//!
//! Event names match what existing browser clients emit and listen for
//! (`join-call`, `signal`, `chat-message`, ...). Handshake payloads inside
//! `signal` are kept as raw JSON text and never interpreted.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{decode, encode};
pub use error::ProtocolError;
pub use message::{ClientEvent, ServerEvent};
