//! Chat log sink
//!
//! Rooms keep an ordered, bounded log of chat messages in arrival order. New
//! joiners get the whole log replayed before any live traffic, and every new
//! message is relayed to the rest of the room right after it is recorded.
//!
//! A [`ChatStore`] can persist messages beyond a room's lifetime. Appends go
//! through the [`Journal`] in recording order. Store calls never run under the
//! coordinator lock and their failures never reach other participants.

pub mod error;
pub mod journal;
pub mod log;
pub mod message;
pub mod sink;
pub mod store;

pub use error::StoreError;
pub use journal::Journal;
pub use log::ChatLog;
pub use message::{ChatMessage, MessageClock};
pub use store::{ChatStore, MemoryChatStore, NoStore};
