//! Coordinator metrics

use std::time::{Duration, Instant};

/// Running counters kept by the coordinator
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinatorCounters {
    /// Total connections ever registered
    pub total_connections: u64,
    /// Rooms created since start
    pub rooms_created: u64,
    /// Handshake messages delivered to a live target
    pub signals_forwarded: u64,
    /// Handshake messages dropped because the target was gone
    pub signals_dropped: u64,
    /// Chat messages recorded
    pub chat_messages: u64,
}

/// Point-in-time snapshot of coordinator state
#[derive(Debug, Clone, Default)]
pub struct CoordinatorStats {
    /// Currently open connections
    pub active_connections: u64,
    /// Currently open rooms
    pub active_rooms: u64,
    /// Cumulative counters
    pub counters: CoordinatorCounters,
    /// Time since the coordinator was created
    pub uptime: Duration,
}

impl CoordinatorStats {
    pub fn new(
        active_connections: usize,
        active_rooms: usize,
        counters: CoordinatorCounters,
        started_at: Instant,
    ) -> Self {
        Self {
            active_connections: active_connections as u64,
            active_rooms: active_rooms as u64,
            counters,
            uptime: started_at.elapsed(),
        }
    }

    /// Fraction of handshake messages that found their target
    pub fn signal_delivery_ratio(&self) -> f64 {
        let total = self.counters.signals_forwarded + self.counters.signals_dropped;
        if total > 0 {
            self.counters.signals_forwarded as f64 / total as f64
        } else {
            1.0
        }
    }
}
