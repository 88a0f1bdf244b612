//! Chat persistence collaborators
//!
//! The coordinator works memory-only by default ([`NoStore`]). A durable
//! store keyed by room code can be plugged in by implementing [`ChatStore`].

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::Mutex;

use super::error::StoreError;
use super::message::ChatMessage;
use crate::room::RoomCode;

/// Durable chat history keyed by room code
///
/// Calls are made from spawned tasks or before the coordinator lock is
/// taken, so implementations are free to do slow I/O.
pub trait ChatStore: Send + Sync + 'static {
    /// Persist one message for a room
    fn append(
        &self,
        code: &RoomCode,
        message: &ChatMessage,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Load the persisted history of a room, oldest first
    fn load(
        &self,
        code: &RoomCode,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, StoreError>> + Send;

    /// Whether this store keeps anything at all
    ///
    /// When false the server skips store calls entirely.
    fn is_durable(&self) -> bool {
        true
    }
}

/// Memory-only operation: history dies with the room
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStore;

impl ChatStore for NoStore {
    async fn append(&self, _code: &RoomCode, _message: &ChatMessage) -> Result<(), StoreError> {
        Ok(())
    }

    async fn load(&self, _code: &RoomCode) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(Vec::new())
    }

    fn is_durable(&self) -> bool {
        false
    }
}

/// In-process store that outlives individual rooms
///
/// Useful for tests and single-node deployments where history should survive
/// everyone leaving a room, but not a restart.
#[derive(Debug, Default)]
pub struct MemoryChatStore {
    rooms: Mutex<HashMap<RoomCode, Vec<ChatMessage>>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages persisted for a room
    pub async fn message_count(&self, code: &RoomCode) -> usize {
        self.rooms.lock().await.get(code).map_or(0, Vec::len)
    }
}

impl ChatStore for MemoryChatStore {
    async fn append(&self, code: &RoomCode, message: &ChatMessage) -> Result<(), StoreError> {
        self.rooms
            .lock()
            .await
            .entry(code.clone())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn load(&self, code: &RoomCode) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(self
            .rooms
            .lock()
            .await
            .get(code)
            .cloned()
            .unwrap_or_default())
    }
}
