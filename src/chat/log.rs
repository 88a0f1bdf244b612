//! Bounded per-room chat log

use std::collections::VecDeque;

use super::message::ChatMessage;

/// Ordered chat history of one room
///
/// Messages are kept in arrival order. When the limit is reached the oldest
/// message is evicted.
#[derive(Debug, Clone)]
pub struct ChatLog {
    messages: VecDeque<ChatMessage>,
    limit: usize,
}

impl ChatLog {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(limit.min(64)),
            limit,
        }
    }

    /// Append a message
    pub fn push(&mut self, message: ChatMessage) {
        if self.limit == 0 {
            return;
        }

        if self.messages.len() == self.limit {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    /// Fill the log from previously persisted messages
    ///
    /// Only the newest `limit` messages are kept.
    pub fn seed(&mut self, messages: Vec<ChatMessage>) {
        let skip = messages.len().saturating_sub(self.limit);
        for message in messages.into_iter().skip(skip) {
            if self.messages.len() == self.limit {
                self.messages.pop_front();
            }
            self.messages.push_back(message);
        }
    }

    /// Snapshot of the log, oldest first
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
