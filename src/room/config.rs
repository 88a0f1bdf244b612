//! Room configuration

/// Per-room behaviour settings
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Maximum chat messages kept in memory per room (0 = keep none)
    pub history_limit: usize,

    /// Send `chat-history` to connections when they join
    pub replay_history: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            history_limit: 100,
            replay_history: true,
        }
    }
}

impl RoomConfig {
    /// Set the in-memory history limit
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Disable history replay on join
    pub fn disable_replay(mut self) -> Self {
        self.replay_history = false;
        self
    }
}
