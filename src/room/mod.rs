//! Room directory
//!
//! The directory maps room codes to the connections currently in them. Rooms
//! are created lazily on the first join and reaped as soon as the last member
//! leaves, taking their in-memory chat log with them.
//!
//! # Architecture
//!
//! ```text
//!                        Coordinator
//!          ┌──────────────────┴──────────────────┐
//!          ▼                                     ▼
//!  ConnectionRegistry                      RoomDirectory
//!  ┌────────────────────┐          ┌──────────────────────────┐
//!  │ conn -> room code  │ ◄──────► │ code -> RoomEntry {      │
//!  └────────────────────┘   same   │   members: {conn, ...},  │
//!                           step   │   chat: ChatLog,         │
//!                                  │ }                        │
//!                                  └──────────────────────────┘
//! ```
//!
//! Both indexes are only ever mutated together by the coordinator, so the
//! member set of a room always equals the connections whose registry entry
//! names it.

pub mod code;
pub mod config;
pub mod directory;
pub mod entry;

pub use code::RoomCode;
pub use config::RoomConfig;
pub use directory::{JoinOutcome, LeaveOutcome, RoomDirectory};
pub use entry::RoomEntry;
