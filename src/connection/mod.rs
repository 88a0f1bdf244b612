//! Connection tracking
//!
//! Every accepted socket gets a [`ConnectionId`] and an entry in the
//! [`ConnectionRegistry`] for as long as it stays open. The entry records the
//! room the connection has joined, which is what disconnect cleanup needs.

pub mod id;
pub mod registry;

pub use id::{ConnectionId, ConnectionIdAllocator};
pub use registry::{ConnectionEntry, ConnectionRegistry};
