//! Room and signaling coordinator for WebRTC calls
//!
//! Browsers connect over WebSocket, join a room by code, exchange opaque
//! WebRTC negotiation payloads addressed to a single peer, and share a text
//! chat whose recent history is replayed to late joiners. No media passes
//! through the server.
//!
//! # Layers
//!
//! - [`coordinator`]: the synchronous state machine. Takes one client event
//!   and returns the frames to send and the chat messages to persist.
//! - [`server`]: the WebSocket transport. Accepts connections, decodes
//!   frames, feeds the coordinator and writes its output back out.
//!
//! # Example
//!
//! ```no_run
//! use huddle::{ServerConfig, SignalServer};
//!
//! # async fn run() -> huddle::Result<()> {
//! let server = SignalServer::new(ServerConfig::default());
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

pub mod chat;
pub mod connection;
pub mod coordinator;
pub mod error;
pub mod protocol;
pub mod relay;
pub mod room;
pub mod server;
pub mod stats;

pub use chat::{ChatMessage, ChatStore, MemoryChatStore, NoStore};
pub use connection::ConnectionId;
pub use coordinator::{Coordinator, Effects};
pub use error::{Error, Result};
pub use protocol::{ClientEvent, ServerEvent};
pub use room::{RoomCode, RoomConfig};
pub use server::{ServerConfig, SignalServer};
pub use stats::CoordinatorStats;

/// Milliseconds since the Unix epoch
pub fn current_timestamp() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_timestamp_is_millis() {
        let before = current_timestamp();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let after = current_timestamp();

        // 2020-09-13 in milliseconds
        assert!(before > 1_600_000_000_000);
        assert!(after > before);
    }
}
