//! Scoped subscriptions.
//!
//! UI components and other short-lived consumers subscribe through
//! [`ClientSubscriptions`] and hold the returned [`SubscriptionGuard`]. A
//! consumer keeps one [`Callback`] for its lifetime and passes it on every
//! mount, so remounting never registers a second identity. Guards for the
//! same target and callback share one hub registration, which is removed
//! when the last of them drops.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::hub::NotificationHub;
use crate::registry::Callback;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Job(String),
    Project,
}

/// A hub registration and the number of live guards sharing it.
struct Hold {
    target: Target,
    callback: Callback,
    guards: usize,
}

#[derive(Default)]
struct Holds(Mutex<Vec<Hold>>);

impl Holds {
    fn lock(&self) -> MutexGuard<'_, Vec<Hold>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Subscribes callbacks to a hub and hands back guards.
#[derive(Clone)]
pub struct ClientSubscriptions {
    hub: NotificationHub,
    holds: Arc<Holds>,
}

impl ClientSubscriptions {
    pub fn new(hub: NotificationHub) -> Self {
        Self {
            hub,
            holds: Arc::default(),
        }
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    /// Call `callback` for every update to `job_id` while the guard lives.
    pub fn subscribe_job(&self, job_id: &str, callback: &Callback) -> SubscriptionGuard {
        self.acquire(Target::Job(job_id.to_string()), callback)
    }

    /// Call `callback` for every update in the connected project while the
    /// guard lives.
    pub fn subscribe_project(&self, callback: &Callback) -> SubscriptionGuard {
        self.acquire(Target::Project, callback)
    }

    fn acquire(&self, target: Target, callback: &Callback) -> SubscriptionGuard {
        let mut holds = self.holds.lock();
        let active = match holds
            .iter_mut()
            .find(|h| h.target == target && h.callback.same_as(callback))
        {
            Some(hold) => {
                hold.guards += 1;
                true
            }
            None => {
                let added = match &target {
                    Target::Job(job_id) => self.hub.subscribe(job_id, callback),
                    Target::Project => self.hub.subscribe_project(callback),
                };
                if added {
                    holds.push(Hold {
                        target: target.clone(),
                        callback: callback.clone(),
                        guards: 1,
                    });
                }
                added
            }
        };
        drop(holds);

        SubscriptionGuard {
            subscriptions: self.clone(),
            target,
            callback: callback.clone(),
            active,
        }
    }

    fn release(&self, target: &Target, callback: &Callback) {
        let mut holds = self.holds.lock();
        let Some(index) = holds
            .iter()
            .position(|h| h.target == *target && h.callback.same_as(callback))
        else {
            return;
        };
        holds[index].guards -= 1;
        if holds[index].guards > 0 {
            return;
        }
        holds.swap_remove(index);
        match target {
            Target::Job(job_id) => self.hub.unsubscribe(job_id, callback),
            Target::Project => self.hub.unsubscribe_project(callback),
        };
    }
}

/// Releases its share of a registration on drop.
#[must_use = "the subscription ends when the guard is dropped"]
pub struct SubscriptionGuard {
    subscriptions: ClientSubscriptions,
    target: Target,
    callback: Callback,
    active: bool,
}

impl SubscriptionGuard {
    /// `false` when registration was refused: a blank job id, or a callback
    /// already registered on the hub directly.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn job_id(&self) -> Option<&str> {
        match &self.target {
            Target::Job(id) => Some(id),
            Target::Project => None,
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if self.active {
            self.subscriptions.release(&self.target, &self.callback);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
