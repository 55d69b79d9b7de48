use std::collections::VecDeque;

use super::Message;

/// Unbounded FIFO of messages.
///
/// A server keeps two of these: messages waiting for a retry and messages
/// already written that wait for their response.
#[derive(Debug, Default)]
pub struct MessageQueue {
    messages: VecDeque<Message>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, message: Message) {
        self.messages.push_back(message);
    }

    pub fn pop_front(&mut self) -> Option<Message> {
        self.messages.pop_front()
    }

    /// Puts a message back at the head, used when a drained message could not
    /// be sent and must keep its place.
    pub fn push_front(&mut self, message: Message) {
        self.messages.push_front(message);
    }

    pub fn front(&self) -> Option<&Message> {
        self.messages.front()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }
}
