//! Ordered chat persistence
//!
//! All appends for a hub go through one background task, so the store sees
//! messages in the order the coordinator recorded them. A flush barrier lets a
//! reader wait until every earlier append has been handed to the store.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::message::ChatMessage;
use super::store::ChatStore;
use crate::room::RoomCode;

/// Maximum queued store jobs before appends are dropped
pub const JOURNAL_CAPACITY: usize = 1024;

enum Job {
    Append { code: RoomCode, message: ChatMessage },
    Flush(oneshot::Sender<()>),
}

/// Handle to the persistence task
///
/// Dropping the last handle stops the task once its queue is drained.
#[derive(Debug)]
pub struct Journal {
    jobs: Option<mpsc::Sender<Job>>,
}

impl Journal {
    /// A journal that persists nothing
    pub fn disabled() -> Self {
        Self { jobs: None }
    }

    /// Start the persistence task for `store`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<S: ChatStore>(store: Arc<S>) -> Self {
        let (tx, rx) = mpsc::channel(JOURNAL_CAPACITY);
        tokio::spawn(run(store, rx));
        Self { jobs: Some(tx) }
    }

    pub fn is_enabled(&self) -> bool {
        self.jobs.is_some()
    }

    /// Queue a message for the store
    ///
    /// Never waits. If the queue is full the message is not persisted.
    pub fn append(&self, code: RoomCode, message: ChatMessage) {
        let Some(jobs) = &self.jobs else {
            return;
        };

        if let Err(mpsc::error::TrySendError::Full(_)) = jobs.try_send(Job::Append { code, message }) {
            tracing::warn!("Chat journal full, message not persisted");
        }
    }

    /// Queue a barrier behind every append issued so far
    ///
    /// The returned receiver resolves once those appends have completed. It
    /// resolves with an error straight away when the journal is disabled or
    /// full, in which case the caller simply does not wait.
    pub fn flush(&self) -> oneshot::Receiver<()> {
        let (done, rx) = oneshot::channel();
        if let Some(jobs) = &self.jobs {
            let _ = jobs.try_send(Job::Flush(done));
        }
        rx
    }
}

async fn run<S: ChatStore>(store: Arc<S>, mut jobs: mpsc::Receiver<Job>) {
    while let Some(job) = jobs.recv().await {
        match job {
            Job::Append { code, message } => {
                if let Err(e) = store.append(&code, &message).await {
                    tracing::warn!(room = %code, error = %e, "Failed to persist chat message");
                }
            }
            Job::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    tracing::debug!("Chat journal stopped");
}
