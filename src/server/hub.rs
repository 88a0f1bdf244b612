//! Shared coordinator hub
//!
//! Owns the coordinator together with each connection's outbox. One event is
//! handled at a time: lock, transition, enqueue frames and chat appends,
//! unlock. Both queues are filled while the lock is held, so every connection
//! sees events in coordinator order and the store sees messages in recording
//! order. The store itself is only awaited outside the lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};

use crate::chat::{ChatMessage, ChatStore, Journal, NoStore};
use crate::connection::{ConnectionId, ConnectionIdAllocator};
use crate::coordinator::{Coordinator, Effects};
use crate::current_timestamp;
use crate::protocol::{self, ClientEvent};
use crate::relay::Delivery;
use crate::room::{RoomCode, RoomConfig};
use crate::stats::CoordinatorStats;

/// Bounded queue of encoded frames for one connection's writer task
pub type Outbox = mpsc::Sender<Bytes>;

/// History loads in flight for one room
#[derive(Debug, Default)]
struct PendingLoad {
    waiters: usize,
    /// Bumped every time the room is created while loads are in flight
    epoch: u64,
}

struct HubState {
    coordinator: Coordinator,
    outboxes: HashMap<ConnectionId, Outbox>,
    journal: Journal,
    loads: HashMap<RoomCode, PendingLoad>,
}

impl HubState {
    fn join(&mut self, conn: ConnectionId, code: RoomCode, history: Option<Vec<ChatMessage>>) {
        let existed = self.coordinator.rooms().contains(&code);
        let effects = self.coordinator.join(conn, code.clone(), history);

        if !existed && self.coordinator.rooms().contains(&code) {
            if let Some(pending) = self.loads.get_mut(&code) {
                pending.epoch += 1;
            }
        }

        self.apply(effects);
    }

    fn begin_load(&mut self, code: &RoomCode) -> u64 {
        let pending = self.loads.entry(code.clone()).or_default();
        pending.waiters += 1;
        pending.epoch
    }

    /// Returns false if the room was created since `begin_load`
    fn end_load(&mut self, code: &RoomCode, epoch: u64) -> bool {
        let Some(pending) = self.loads.get_mut(code) else {
            return false;
        };

        let fresh = pending.epoch == epoch;
        pending.waiters -= 1;
        if pending.waiters == 0 {
            self.loads.remove(code);
        }
        fresh
    }

    fn apply(&mut self, effects: Effects) {
        let Effects { deliveries, persist } = effects;

        for (code, message) in persist {
            self.journal.append(code, message);
        }
        self.deliver(deliveries);
    }

    /// Encode each delivery once and queue it for every recipient
    ///
    /// A recipient whose outbox is full is disconnected, and the departures
    /// that causes are delivered in turn.
    fn deliver(&mut self, mut deliveries: Vec<Delivery>) {
        while !deliveries.is_empty() {
            let mut slow: Vec<ConnectionId> = Vec::new();

            for delivery in deliveries.drain(..) {
                let frame = match protocol::encode(&delivery.event) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(event = delivery.event.name(), error = %e, "Failed to encode event");
                        continue;
                    }
                };

                for conn in delivery.recipients {
                    if slow.contains(&conn) {
                        continue;
                    }
                    let Some(outbox) = self.outboxes.get(&conn) else {
                        continue;
                    };
                    // Closed means the writer already stopped; disconnect follows
                    if let Err(TrySendError::Full(_)) = outbox.try_send(frame.clone()) {
                        slow.push(conn);
                    }
                }
            }

            for conn in slow {
                tracing::warn!(connection = %conn, "Outbox full, disconnecting slow client");
                self.outboxes.remove(&conn);
                deliveries.extend(self.coordinator.disconnect(conn).deliveries);
            }
        }
    }
}

/// Coordinator shared by all connection tasks
pub struct Hub<S: ChatStore = NoStore> {
    state: Mutex<HubState>,
    store: Arc<S>,
    ids: ConnectionIdAllocator,
}

impl Hub<NoStore> {
    /// Create a memory-only hub
    pub fn new(config: RoomConfig) -> Self {
        Self::with_store(config, NoStore)
    }
}

impl<S: ChatStore> Hub<S> {
    /// Create a hub that persists chat through `store`
    ///
    /// Durable stores get a persistence task, so this must then be called
    /// from within a Tokio runtime.
    pub fn with_store(config: RoomConfig, store: S) -> Self {
        let store = Arc::new(store);
        let journal = if store.is_durable() {
            Journal::spawn(Arc::clone(&store))
        } else {
            Journal::disabled()
        };

        Self {
            state: Mutex::new(HubState {
                coordinator: Coordinator::with_config(config),
                outboxes: HashMap::new(),
                journal,
                loads: HashMap::new(),
            }),
            store,
            ids: ConnectionIdAllocator::new(),
        }
    }

    /// Get the chat store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Register a new connection whose frames go to `outbox`
    pub async fn connect(&self, outbox: Outbox) -> ConnectionId {
        let conn = self.ids.allocate();

        let mut state = self.state.lock().await;
        state.outboxes.insert(conn, outbox);
        let effects = state.coordinator.connect(conn);
        state.apply(effects);

        conn
    }

    /// Clean up after a connection closed, gracefully or not
    ///
    /// Drops the outbox, which ends the connection's writer task once it has
    /// flushed what is queued.
    pub async fn disconnect(&self, conn: ConnectionId) {
        let mut state = self.state.lock().await;
        state.outboxes.remove(&conn);
        let effects = state.coordinator.disconnect(conn);
        state.apply(effects);
    }

    /// Handle one decoded client event
    pub async fn dispatch(&self, conn: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::JoinCall { room_code } => self.join(conn, room_code).await,
            other => {
                let mut state = self.state.lock().await;
                let effects = state.coordinator.handle(conn, other, current_timestamp());
                state.apply(effects);
            }
        }
    }

    /// Join a room, seeding it from the store if this join creates it
    ///
    /// The store is read between two lock holds. A flush barrier queued under
    /// the first makes every earlier append visible to the load. If someone
    /// else creates the room meanwhile the load is stale: an open room is
    /// joined as it is, a room that has already closed again is reloaded.
    async fn join(&self, conn: ConnectionId, code: RoomCode) {
        let mut state = self.state.lock().await;

        loop {
            if !state.coordinator.connections().is_live(conn) {
                return;
            }

            if !state.journal.is_enabled() || state.coordinator.rooms().contains(&code) {
                state.join(conn, code, None);
                return;
            }

            let epoch = state.begin_load(&code);
            let flushed = state.journal.flush();
            drop(state);

            let _ = flushed.await;
            let history = match self.store.load(&code).await {
                Ok(messages) => Some(messages),
                Err(e) => {
                    tracing::warn!(room = %code, error = %e, "Failed to load chat history");
                    None
                }
            };

            state = self.state.lock().await;
            let fresh = state.end_load(&code, epoch);
            if fresh || state.coordinator.rooms().contains(&code) {
                state.join(conn, code, history);
                return;
            }

            tracing::debug!(room = %code, "Room reopened during history load, reloading");
        }
    }

    /// Members of a room
    pub async fn room_members(&self, code: &RoomCode) -> Vec<ConnectionId> {
        self.state.lock().await.coordinator.rooms().members(code)
    }

    /// Number of open rooms
    pub async fn room_count(&self) -> usize {
        self.state.lock().await.coordinator.rooms().room_count()
    }

    /// Snapshot of coordinator statistics
    pub async fn stats(&self) -> CoordinatorStats {
        self.state.lock().await.coordinator.stats()
    }

    /// Spawn a task that logs stats every `interval`
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_stats_task(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let hub = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let stats = hub.stats().await;
                tracing::info!(
                    connections = stats.active_connections,
                    rooms = stats.active_rooms,
                    signals_forwarded = stats.counters.signals_forwarded,
                    signals_dropped = stats.counters.signals_dropped,
                    signal_delivery_ratio = stats.signal_delivery_ratio(),
                    chat_messages = stats.counters.chat_messages,
                    "Coordinator stats"
                );
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::{json, Value};
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::sync::mpsc::Receiver;
    use tokio::sync::Notify;

    use super::*;
    use crate::chat::{MemoryChatStore, StoreError};

    struct FailingStore;

    impl ChatStore for FailingStore {
        async fn append(&self, _code: &RoomCode, _message: &ChatMessage) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disk on fire".into()))
        }

        async fn load(&self, _code: &RoomCode) -> Result<Vec<ChatMessage>, StoreError> {
            Err(StoreError::Unavailable("disk on fire".into()))
        }
    }

    /// Takes longer to store "first" than anything else
    #[derive(Default)]
    struct SlowFirstStore {
        inner: MemoryChatStore,
    }

    impl ChatStore for SlowFirstStore {
        async fn append(&self, code: &RoomCode, message: &ChatMessage) -> Result<(), StoreError> {
            if message.body == "first" {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            self.inner.append(code, message).await
        }

        async fn load(&self, code: &RoomCode) -> Result<Vec<ChatMessage>, StoreError> {
            self.inner.load(code).await
        }
    }

    /// Holds its first load open until released, after reading the store
    #[derive(Default)]
    struct GatedStore {
        inner: MemoryChatStore,
        loads: AtomicUsize,
        waiting: Notify,
        release: Notify,
    }

    impl ChatStore for GatedStore {
        async fn append(&self, code: &RoomCode, message: &ChatMessage) -> Result<(), StoreError> {
            self.inner.append(code, message).await
        }

        async fn load(&self, code: &RoomCode) -> Result<Vec<ChatMessage>, StoreError> {
            let result = self.inner.load(code).await;
            if self.loads.fetch_add(1, Ordering::SeqCst) == 0 {
                self.waiting.notify_one();
                self.release.notified().await;
            }
            result
        }
    }

    fn drain(rx: &mut Receiver<Bytes>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(serde_json::from_slice(&frame).unwrap());
        }
        frames
    }

    fn events(frames: &[Value]) -> Vec<&str> {
        frames
            .iter()
            .map(|f| f["event"].as_str().unwrap_or_default())
            .collect()
    }

    fn bodies(frame: &Value) -> Vec<&str> {
        frame["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["body"].as_str().unwrap())
            .collect()
    }

    fn join_r1() -> ClientEvent {
        ClientEvent::JoinCall {
            room_code: RoomCode::from("R1"),
        }
    }

    async fn connect<S: ChatStore>(hub: &Hub<S>, capacity: usize) -> (ConnectionId, Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (hub.connect(tx).await, rx)
    }

    async fn join<S: ChatStore>(hub: &Hub<S>) -> (ConnectionId, Receiver<Bytes>) {
        let (conn, rx) = connect(hub, 64).await;
        hub.dispatch(conn, join_r1()).await;
        (conn, rx)
    }

    fn chat(body: &str) -> ClientEvent {
        ClientEvent::ChatMessage {
            body: body.to_owned(),
            sender_name: "alice".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_connect_sends_id() {
        let hub = Hub::new(RoomConfig::default());
        let (conn, mut rx) = connect(&hub, 8).await;

        let frames = drain(&mut rx);
        assert_eq!(
            frames,
            vec![json!({"event": "connected", "data": {"connectionId": conn.get()}})]
        );
    }

    #[tokio::test]
    async fn test_join_frames_in_order() {
        let hub = Hub::new(RoomConfig::default());
        let (a, mut a_rx) = join(&hub).await;
        let (b, mut b_rx) = join(&hub).await;

        let a_frames = drain(&mut a_rx);
        assert_eq!(
            events(&a_frames),
            vec!["connected", "chat-history", "room-joined", "user-joined"]
        );
        assert_eq!(a_frames[3]["data"]["connectionId"], json!(b.get()));

        let b_frames = drain(&mut b_rx);
        assert_eq!(events(&b_frames), vec!["connected", "chat-history", "room-joined"]);
        assert_eq!(b_frames[2]["data"]["members"], json!([a.get()]));
    }

    #[tokio::test]
    async fn test_disconnect_notifies_room() {
        let hub = Hub::new(RoomConfig::default());
        let (a, mut a_rx) = join(&hub).await;
        let (b, _b_rx) = join(&hub).await;
        drain(&mut a_rx);

        hub.disconnect(b).await;
        hub.disconnect(b).await;

        let frames = drain(&mut a_rx);
        assert_eq!(
            frames,
            vec![json!({"event": "user-left", "data": {"connectionId": b.get()}})]
        );
        assert_eq!(hub.room_members(&RoomCode::from("R1")).await, vec![a]);

        hub.disconnect(a).await;
        assert_eq!(hub.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_history_survives_room_with_store() {
        let hub = Hub::with_store(RoomConfig::default(), MemoryChatStore::new());
        let code = RoomCode::from("R1");

        let (a, _a_rx) = join(&hub).await;
        hub.dispatch(a, chat("remember me")).await;
        hub.disconnect(a).await;
        assert_eq!(hub.room_count().await, 0);

        // the join waits for the pending append before loading
        let (_b, mut b_rx) = join(&hub).await;
        assert_eq!(hub.store().message_count(&code).await, 1);

        let frames = drain(&mut b_rx);
        assert_eq!(frames[1]["event"], json!("chat-history"));
        assert_eq!(bodies(&frames[1]), vec!["remember me"]);
    }

    #[tokio::test]
    async fn test_history_lost_without_store() {
        let hub = Hub::new(RoomConfig::default());

        let (a, _a_rx) = join(&hub).await;
        hub.dispatch(a, chat("gone soon")).await;
        hub.disconnect(a).await;

        let (_b, mut b_rx) = join(&hub).await;
        let frames = drain(&mut b_rx);
        assert_eq!(frames[1], json!({"event": "chat-history", "data": []}));
    }

    #[tokio::test]
    async fn test_stored_history_keeps_arrival_order() {
        let hub = Hub::with_store(RoomConfig::default(), SlowFirstStore::default());
        let code = RoomCode::from("R1");

        let (a, _a_rx) = join(&hub).await;
        hub.dispatch(a, chat("first")).await;
        hub.dispatch(a, chat("second")).await;
        hub.disconnect(a).await;

        let (_b, mut b_rx) = join(&hub).await;

        let stored: Vec<String> = hub
            .store()
            .load(&code)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.body)
            .collect();
        assert_eq!(stored, vec!["first", "second"]);

        let frames = drain(&mut b_rx);
        assert_eq!(frames[1]["event"], json!("chat-history"));
        assert_eq!(bodies(&frames[1]), vec!["first", "second"]);
        assert!(frames[1]["data"][0]["timestamp"].as_u64() < frames[1]["data"][1]["timestamp"].as_u64());
    }

    #[tokio::test]
    async fn test_stale_history_load_is_retried() {
        let hub = Arc::new(Hub::with_store(RoomConfig::default(), GatedStore::default()));
        let code = RoomCode::from("R1");

        // a's load reads the empty store, then stalls
        let (a, mut a_rx) = connect(&hub, 64).await;
        let slow_join = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move { hub.dispatch(a, join_r1()).await })
        };
        hub.store().waiting.notified().await;

        // meanwhile the room opens, gets a message and closes again
        let (b, _b_rx) = join(&hub).await;
        hub.dispatch(b, chat("while you were loading")).await;
        hub.disconnect(b).await;
        assert_eq!(hub.room_count().await, 0);

        hub.store().release.notify_one();
        slow_join.await.unwrap();

        let frames = drain(&mut a_rx);
        assert_eq!(events(&frames), vec!["connected", "chat-history", "room-joined"]);
        assert_eq!(bodies(&frames[1]), vec!["while you were loading"]);
        assert_eq!(hub.room_members(&code).await, vec![a]);
    }

    #[tokio::test]
    async fn test_store_failure_does_not_block_chat() {
        let hub = Hub::with_store(RoomConfig::default(), FailingStore);
        let (a, _a_rx) = join(&hub).await;
        let (_b, mut b_rx) = join(&hub).await;
        drain(&mut b_rx);

        hub.dispatch(a, chat("still works")).await;

        let frames = drain(&mut b_rx);
        assert_eq!(events(&frames), vec!["chat-message"]);
        assert_eq!(frames[0]["data"]["body"], json!("still works"));
        assert_eq!(frames[0]["data"]["originConnectionId"], json!(a.get()));
    }

    #[tokio::test]
    async fn test_slow_client_is_disconnected() {
        let hub = Hub::new(RoomConfig::default());

        // room for connected, chat-history, room-joined, user-joined and one chat
        let (slow, mut slow_rx) = connect(&hub, 5).await;
        hub.dispatch(slow, join_r1()).await;
        let (b, mut b_rx) = join(&hub).await;
        drain(&mut b_rx);

        hub.dispatch(b, chat("one")).await;
        assert_eq!(hub.room_members(&RoomCode::from("R1")).await, vec![slow, b]);

        hub.dispatch(b, chat("two")).await;
        assert_eq!(hub.room_members(&RoomCode::from("R1")).await, vec![b]);
        assert_eq!(hub.stats().await.active_connections, 1);

        let frames = drain(&mut b_rx);
        assert_eq!(
            frames,
            vec![json!({"event": "user-left", "data": {"connectionId": slow.get()}})]
        );

        // what was queued is still delivered, then the outbox is closed
        let queued = drain(&mut slow_rx);
        assert_eq!(
            events(&queued),
            vec!["connected", "chat-history", "room-joined", "user-joined", "chat-message"]
        );
        assert_eq!(slow_rx.try_recv(), Err(TryRecvError::Disconnected));

        // later events from the dropped client are ignored
        hub.dispatch(slow, chat("ignored")).await;
        assert!(drain(&mut b_rx).is_empty());
    }

    #[tokio::test]
    async fn test_stats() {
        let hub = Hub::new(RoomConfig::default());
        let (a, _a_rx) = join(&hub).await;
        let (b, _b_rx) = join(&hub).await;

        hub.dispatch(
            a,
            ClientEvent::Signal {
                to: b,
                message: serde_json::value::RawValue::from_string("{}".into()).unwrap(),
            },
        )
        .await;

        let stats = hub.stats().await;
        assert_eq!(stats.active_connections, 2);
        assert_eq!(stats.active_rooms, 1);
        assert_eq!(stats.counters.signals_forwarded, 1);
    }
}
