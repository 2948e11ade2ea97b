use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::queue::EventQueue;

/// Application context shared by the GUI thread and the monitor thread:
/// the message queue and the running flag. The flag is the only other
/// cross-thread state and is observed atomically by both sides.
#[derive(Clone)]
pub struct Ctx {
    pub events: EventQueue,
    running: Arc<AtomicBool>,
}

impl Ctx {
    pub fn new() -> Self {
        Self {
            events: EventQueue::new(),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Cooperative cancellation: the monitor thread observes this on its
    /// next poll iteration.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
    }
}

impl Default for Ctx {
    fn default() -> Self {
        Self::new()
    }
}
