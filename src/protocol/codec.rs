//! Envelope encoding and decoding

use bytes::Bytes;
use serde::Deserialize;
use serde_json::value::RawValue;

use super::error::ProtocolError;
use super::message::{names, ClientEvent, ServerEvent};
use crate::connection::ConnectionId;
use crate::room::RoomCode;

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Option<Box<RawValue>>,
}

/// `join-call` accepts the bare room code or an object carrying it
#[derive(Deserialize)]
#[serde(untagged)]
enum JoinData {
    Code(RoomCode),
    #[serde(rename_all = "camelCase")]
    Object { room_code: RoomCode },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignalData {
    to_connection_id: ConnectionId,
    message: Box<RawValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatData {
    body: String,
    #[serde(default)]
    sender_name: String,
}

/// Decode one text frame from a client
///
/// The envelope is parsed first and `data` is kept raw until the event name
/// is known, so `signal` payloads reach the relay untouched.
pub fn decode(text: &str) -> Result<ClientEvent, ProtocolError> {
    let envelope: Envelope = serde_json::from_str(text)?;

    match envelope.event.as_str() {
        names::JOIN_CALL => {
            let data = require(envelope.data, names::JOIN_CALL)?;
            let room_code = match serde_json::from_str(data.get())? {
                JoinData::Code(code) => code,
                JoinData::Object { room_code } => room_code,
            };
            Ok(ClientEvent::JoinCall { room_code })
        }
        names::LEAVE_CALL => Ok(ClientEvent::LeaveCall),
        names::SIGNAL => {
            let data = require(envelope.data, names::SIGNAL)?;
            let signal: SignalData = serde_json::from_str(data.get())?;
            Ok(ClientEvent::Signal {
                to: signal.to_connection_id,
                message: signal.message,
            })
        }
        names::CHAT_MESSAGE => {
            let data = require(envelope.data, names::CHAT_MESSAGE)?;
            let chat: ChatData = serde_json::from_str(data.get())?;
            Ok(ClientEvent::ChatMessage {
                body: chat.body,
                sender_name: chat.sender_name,
            })
        }
        other => Err(ProtocolError::UnknownEvent(other.to_owned())),
    }
}

/// Encode a server event into a text frame
///
/// The result is reference counted, so one encoding can be shared by every
/// recipient of a broadcast.
pub fn encode(event: &ServerEvent) -> Result<Bytes, ProtocolError> {
    Ok(Bytes::from(serde_json::to_vec(event)?))
}

fn require(
    data: Option<Box<RawValue>>,
    event: &'static str,
) -> Result<Box<RawValue>, ProtocolError> {
    data.ok_or(ProtocolError::MissingData(event))
}
