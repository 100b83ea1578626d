//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! The API server publishes every [`JobStatusEvent`] the scheduler reports
//! here; each open notification socket holds its own receiver.

use tokio::sync::broadcast;

use cryoflow_core::job_events::JobStatusEvent;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out of job status events.
///
/// Shared via `Arc<EventBus>`.
pub struct EventBus {
    sender: broadcast::Sender<JobStatusEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest unread events are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current receivers. Returns how many there were.
    pub fn publish(&self, event: JobStatusEvent) -> usize {
        // A SendError only means nobody is listening.
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobStatusEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
