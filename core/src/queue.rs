use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Unbounded FIFO of formatted messages between the monitor thread and the
/// display tick. Clones share the same queue.
#[derive(Clone, Default)]
pub struct EventQueue {
    inner: Arc<Mutex<VecDeque<String>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, message: impl Into<String>) {
        self.inner.lock().unwrap().push_back(message.into());
    }

    /// Takes everything currently queued, in push order. Never blocks
    /// waiting for a producer.
    pub fn drain(&self) -> Vec<String> {
        self.inner.lock().unwrap().drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}
