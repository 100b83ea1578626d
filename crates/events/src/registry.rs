//! Subscriber bookkeeping and dispatch for the notification hub.
//!
//! Two independent indexes: per-job callbacks keyed by job id, and one list
//! of project-level callbacks. A callback is identified by its shared
//! pointer, so registering the same [`Callback`] twice in one list is a
//! no-op. Lists keep registration order.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cryoflow_core::job_events::JobStatusEvent;

type CallbackFn = dyn Fn(&JobStatusEvent) -> anyhow::Result<()> + Send + Sync;

/// A subscriber callback. Cheap to clone; clones share identity.
#[derive(Clone)]
pub struct Callback(Arc<CallbackFn>);

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&JobStatusEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Same underlying closure, not merely equal behaviour.
    pub fn same_as(&self, other: &Callback) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }

    fn call(&self, event: &JobStatusEvent) -> anyhow::Result<()> {
        (self.0)(event)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// Why a callback did not complete.
#[derive(Debug, thiserror::Error)]
pub enum CallbackFailure {
    #[error("callback returned an error: {0:#}")]
    Error(anyhow::Error),

    #[error("callback panicked: {0}")]
    Panic(String),
}

/// Observer for callback failures, installed on the hub.
pub type FailureHook = Arc<dyn Fn(&JobStatusEvent, &CallbackFailure) + Send + Sync>;

/// Counts from one [`SubscriptionRegistry::dispatch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Default)]
struct Subscribers {
    jobs: HashMap<String, Vec<Callback>>,
    project: Vec<Callback>,
}

/// Per-job and per-project callback sets.
#[derive(Default)]
pub struct SubscriptionRegistry {
    inner: Mutex<Subscribers>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        // Callbacks never run under the lock, so a poisoned lock still holds
        // consistent data.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `callback` for `job_id`. Returns `false` if the id is blank
    /// or the callback was already registered for it.
    pub fn subscribe(&self, job_id: &str, callback: &Callback) -> bool {
        if job_id.trim().is_empty() {
            return false;
        }
        let mut subs = self.lock();
        let list = subs.jobs.entry(job_id.to_string()).or_default();
        insert_unique(list, callback)
    }

    /// Remove `callback` from `job_id`, dropping the entry once it is empty.
    pub fn unsubscribe(&self, job_id: &str, callback: &Callback) -> bool {
        let mut subs = self.lock();
        let Some(list) = subs.jobs.get_mut(job_id) else {
            return false;
        };
        let removed = remove(list, callback);
        if list.is_empty() {
            subs.jobs.remove(job_id);
        }
        removed
    }

    pub fn subscribe_project(&self, callback: &Callback) -> bool {
        insert_unique(&mut self.lock().project, callback)
    }

    pub fn unsubscribe_project(&self, callback: &Callback) -> bool {
        remove(&mut self.lock().project, callback)
    }

    /// Job ids with at least one callback.
    pub fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().jobs.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn job_subscriber_count(&self, job_id: &str) -> usize {
        self.lock().jobs.get(job_id).map_or(0, Vec::len)
    }

    pub fn project_subscriber_count(&self) -> usize {
        self.lock().project.len()
    }

    /// Invoke the callbacks for `event.job_id`, then every project callback,
    /// each in registration order.
    ///
    /// Works on a snapshot taken under the lock, so callbacks may register or
    /// unregister (themselves included) while running. A failing callback
    /// is logged, reported to `on_failure`, and does not stop the others.
    pub fn dispatch(
        &self,
        event: &JobStatusEvent,
        on_failure: Option<&FailureHook>,
    ) -> DispatchReport {
        let (job_callbacks, project_callbacks) = {
            let subs = self.lock();
            (
                subs.jobs.get(&event.job_id).cloned().unwrap_or_default(),
                subs.project.clone(),
            )
        };

        let mut report = DispatchReport::default();
        for callback in job_callbacks.iter().chain(project_callbacks.iter()) {
            match invoke(callback, event) {
                Ok(()) => report.delivered += 1,
                Err(failure) => {
                    report.failed += 1;
                    tracing::warn!(
                        job_id = %event.job_id,
                        project_id = %event.project_id,
                        error = %failure,
                        "Subscriber callback failed",
                    );
                    if let Some(hook) = on_failure {
                        hook(event, &failure);
                    }
                }
            }
        }
        report
    }
}

fn insert_unique(list: &mut Vec<Callback>, callback: &Callback) -> bool {
    if list.iter().any(|c| c.same_as(callback)) {
        return false;
    }
    list.push(callback.clone());
    true
}

fn remove(list: &mut Vec<Callback>, callback: &Callback) -> bool {
    let before = list.len();
    list.retain(|c| !c.same_as(callback));
    list.len() != before
}

fn invoke(callback: &Callback, event: &JobStatusEvent) -> Result<(), CallbackFailure> {
    match panic::catch_unwind(AssertUnwindSafe(|| callback.call(event))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(CallbackFailure::Error(e)),
        Err(payload) => Err(CallbackFailure::Panic(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
