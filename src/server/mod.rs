//! WebSocket server
//!
//! The transport shell around the [`Coordinator`](crate::coordinator::Coordinator):
//! an accept loop, one reader and one writer task per connection, and a shared
//! [`Hub`] that serializes coordinator access and carries out its effects.

pub mod config;
pub mod connection;
pub mod hub;
pub mod listener;

pub use config::ServerConfig;
pub use hub::{Hub, Outbox};
pub use listener::SignalServer;
