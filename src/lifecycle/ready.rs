//! Completion signal for `set`.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

/// Buffered ready events per subscriber before the oldest are dropped.
const CAPACITY: usize = 16;

/// Payload of one ready event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ready {
    /// Number of successful `set` calls so far, this one included.
    pub generation: u64,
    /// Decoded paths the query routed, in query order.
    pub paths: Vec<String>,
}

/// Broadcasts a [`Ready`] event after each fully applied query.
pub struct ReadySignal {
    tx: broadcast::Sender<Ready>,
    generation: AtomicU64,
}

impl ReadySignal {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CAPACITY);
        Self {
            tx,
            generation: AtomicU64::new(0),
        }
    }

    /// Subscribe to future ready events.
    pub fn subscribe(&self) -> broadcast::Receiver<Ready> {
        self.tx.subscribe()
    }

    /// Send a ready event. Having no subscribers is not an error.
    pub fn emit(&self, paths: Vec<String>) -> Ready {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let event = Ready { generation, paths };
        let delivered = self.tx.send(event.clone()).unwrap_or(0);
        tracing::debug!(generation, subscribers = delivered, "Ready event emitted");
        event
    }

    /// Ready events emitted so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}
