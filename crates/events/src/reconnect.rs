//! Single-slot delayed reconnection.
//!
//! [`ReconnectTimer`] holds at most one pending attempt. Scheduling a new
//! one aborts whatever was pending, so however many close or error signals
//! arrive for a connection, only one reconnection is ever in flight.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

struct Pending {
    id: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Slot {
    next_id: u64,
    pending: Option<Pending>,
}

#[derive(Default)]
pub struct ReconnectTimer {
    slot: Arc<Mutex<Slot>>,
}

impl ReconnectTimer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
        slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `action` after `delay`, replacing any pending action.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule<F>(&self, delay: Duration, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = Self::lock(&self.slot);
        if let Some(previous) = slot.pending.take() {
            previous.handle.abort();
        }
        slot.next_id += 1;
        let id = slot.next_id;

        let shared = Arc::clone(&self.slot);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut slot = Self::lock(&shared);
                if slot.pending.as_ref().map(|p| p.id) != Some(id) {
                    return;
                }
                // Clear the slot before firing so the action may schedule again.
                slot.pending = None;
            }
            action();
        });
        slot.pending = Some(Pending { id, handle });
    }

    /// Abort the pending action. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match Self::lock(&self.slot).pending.take() {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        Self::lock(&self.slot).pending.is_some()
    }
}

impl Drop for ReconnectTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
