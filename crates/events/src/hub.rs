//! Client-side notification hub.
//!
//! [`NotificationHub`] owns the one WebSocket connection a process keeps to
//! the notification endpoint, the registry of subscriber callbacks, and the
//! reconnection timer. Build it once at startup and hand clones to whatever
//! needs to subscribe; clones share everything.
//!
//! Lifecycle of a connection:
//!
//! ```text
//! Disconnected --connect(p)--> Connecting --open--> Connected
//!      ^                            |                   |
//!      +-------- close / error -----+-------------------+
//!      |
//!      +-- reconnection after `reconnect_delay`, forever, until
//!          disconnect(), shutdown(), or connect() to another project
//! ```
//!
//! Every session carries an epoch. Switching projects or disconnecting
//! bumps the epoch, and a session whose epoch is no longer current has been
//! detached: its close is ignored and it never schedules a reconnection.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tokio_util::sync::CancellationToken;

use cryoflow_core::job_events::subscribe_frame;

use crate::config::HubConfig;
use crate::messages::parse_job_update;
use crate::reconnect::ReconnectTimer;
use crate::registry::{Callback, FailureHook, SubscriptionRegistry};
use crate::transport::{Connector, TransportError, WsConnector};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Default)]
struct SessionSlot {
    state: ConnectionState,
    project_id: Option<String>,
    epoch: u64,
    /// Cancels the current session task.
    cancel: Option<CancellationToken>,
}

struct HubInner {
    config: HubConfig,
    connector: Arc<dyn Connector>,
    registry: SubscriptionRegistry,
    session: Mutex<SessionSlot>,
    reconnect: ReconnectTimer,
    failure_hook: RwLock<Option<FailureHook>>,
    shutdown: CancellationToken,
}

/// Shared handle to the process's notification connection.
#[derive(Clone)]
pub struct NotificationHub {
    inner: Arc<HubInner>,
}

impl NotificationHub {
    /// A hub that connects over WebSocket to `config.endpoint`.
    pub fn new(config: HubConfig) -> Self {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    pub fn with_connector(config: HubConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            inner: Arc::new(HubInner {
                config,
                connector,
                registry: SubscriptionRegistry::new(),
                session: Mutex::new(SessionSlot::default()),
                reconnect: ReconnectTimer::new(),
                failure_hook: RwLock::new(None),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Route callback failures to `hook` in addition to the log.
    pub fn set_failure_hook(&self, hook: FailureHook) {
        *self
            .inner
            .failure_hook
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(hook);
    }

    /// Connect to the endpoint and subscribe to `project_id`.
    ///
    /// No-op when already connected or connecting to the same project.
    /// Otherwise the current connection is detached, any pending
    /// reconnection is cancelled, and a new connection is opened. Must be
    /// called from within a Tokio runtime.
    pub fn connect(&self, project_id: &str) {
        let project_id = project_id.trim();
        if project_id.is_empty() {
            tracing::warn!("Ignoring connect without a project id");
            return;
        }
        if self.inner.shutdown.is_cancelled() {
            tracing::debug!(project_id, "Hub is shut down, not connecting");
            return;
        }

        let mut slot = self.inner.lock_session();
        let same_project = slot.project_id.as_deref() == Some(project_id);
        if same_project && slot.state != ConnectionState::Disconnected {
            return;
        }
        if let Some(previous) = slot.project_id.as_deref().filter(|_| !same_project) {
            tracing::info!(from = %previous, to = %project_id, "Switching notification project");
        }
        self.inner.start_session(&mut slot, project_id.to_string());
    }

    /// Close the connection and cancel any pending reconnection.
    /// Subscriptions are kept.
    pub fn disconnect(&self) {
        let mut slot = self.inner.lock_session();
        if let Some(cancel) = slot.cancel.take() {
            cancel.cancel();
        }
        self.inner.reconnect.cancel();
        slot.epoch += 1;
        slot.state = ConnectionState::Disconnected;
        slot.project_id = None;
    }

    /// Disconnect for good. Later `connect` calls are ignored.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down notification hub");
        self.inner.shutdown.cancel();
        self.disconnect();
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock_session().state
    }

    /// Project the hub is connected, connecting, or reconnecting to.
    pub fn project_id(&self) -> Option<String> {
        self.inner.lock_session().project_id.clone()
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.inner.registry
    }

    /// Register `callback` for updates to `job_id`. Blank ids are ignored.
    pub fn subscribe(&self, job_id: &str, callback: &Callback) -> bool {
        self.inner.registry.subscribe(job_id, callback)
    }

    pub fn unsubscribe(&self, job_id: &str, callback: &Callback) -> bool {
        self.inner.registry.unsubscribe(job_id, callback)
    }

    /// Register `callback` for every update in the connected project.
    pub fn subscribe_project(&self, callback: &Callback) -> bool {
        self.inner.registry.subscribe_project(callback)
    }

    pub fn unsubscribe_project(&self, callback: &Callback) -> bool {
        self.inner.registry.unsubscribe_project(callback)
    }
}

impl HubInner {
    fn lock_session(&self) -> MutexGuard<'_, SessionSlot> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Detach the current session and spawn a new one for `project_id`.
    fn start_session(self: &Arc<Self>, slot: &mut SessionSlot, project_id: String) {
        if let Some(previous) = slot.cancel.take() {
            previous.cancel();
        }
        self.reconnect.cancel();

        slot.epoch += 1;
        slot.state = ConnectionState::Connecting;
        slot.project_id = Some(project_id.clone());
        let cancel = self.shutdown.child_token();
        slot.cancel = Some(cancel.clone());

        tokio::spawn(run_session(Arc::clone(self), project_id, slot.epoch, cancel));
    }

    /// Returns `false` when the session was detached while connecting.
    fn mark_connected(&self, epoch: u64) -> bool {
        let mut slot = self.lock_session();
        if slot.epoch != epoch {
            return false;
        }
        slot.state = ConnectionState::Connected;
        true
    }

    /// The session for `epoch` ended on its own: close, error, or failed
    /// connect. Schedules the single reconnection.
    fn on_closed(self: &Arc<Self>, epoch: u64) {
        let mut slot = self.lock_session();
        if slot.epoch != epoch || self.shutdown.is_cancelled() {
            tracing::debug!(epoch, "Ignoring close of a detached session");
            return;
        }
        slot.state = ConnectionState::Disconnected;
        slot.cancel = None;
        let Some(project_id) = slot.project_id.clone() else {
            return;
        };

        let delay = self.config.reconnect_delay;
        tracing::info!(
            project_id = %project_id,
            delay_ms = delay.as_millis() as u64,
            "Notification connection lost, scheduling reconnect",
        );
        let hub = Arc::downgrade(self);
        self.reconnect.schedule(delay, move || {
            if let Some(hub) = hub.upgrade() {
                hub.reconnect_if_current(epoch);
            }
        });
    }

    fn reconnect_if_current(self: &Arc<Self>, epoch: u64) {
        let mut slot = self.lock_session();
        if slot.epoch != epoch
            || slot.state != ConnectionState::Disconnected
            || self.shutdown.is_cancelled()
        {
            return;
        }
        let Some(project_id) = slot.project_id.clone() else {
            return;
        };
        tracing::info!(project_id = %project_id, "Reconnecting to notification endpoint");
        self.start_session(&mut slot, project_id);
    }

    fn handle_text(&self, text: &str, project_id: &str) {
        match parse_job_update(text, project_id) {
            Ok(event) => {
                let hook = self
                    .failure_hook
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                let report = self.registry.dispatch(&event, hook.as_ref());
                tracing::trace!(
                    job_id = %event.job_id,
                    delivered = report.delivered,
                    failed = report.failed,
                    "Dispatched job update",
                );
            }
            Err(e) => {
                tracing::debug!(project_id, error = %e, "Dropping inbound message");
            }
        }
    }
}

/// One connection's lifetime: connect, subscribe, read until closed.
async fn run_session(
    hub: Arc<HubInner>,
    project_id: String,
    epoch: u64,
    cancel: CancellationToken,
) {
    let connected = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = hub.connector.connect(&hub.config.endpoint) => result,
    };
    let mut conn = match connected {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(project_id = %project_id, error = %e, "Notification connect failed");
            hub.on_closed(epoch);
            return;
        }
    };

    if !hub.mark_connected(epoch) {
        conn.close().await;
        return;
    }

    let sent = match subscribe_frame(&project_id) {
        Ok(frame) => conn.send_text(frame).await,
        Err(e) => Err(TransportError::Send(e.to_string())),
    };
    if let Err(e) = sent {
        tracing::warn!(project_id = %project_id, error = %e, "Failed to send subscribe frame");
        hub.on_closed(epoch);
        return;
    }
    tracing::info!(project_id = %project_id, "Subscribed to job updates");

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            frame = conn.next_text() => Some(frame),
        };
        match next {
            None => {
                conn.close().await;
                return;
            }
            Some(Some(Ok(text))) => hub.handle_text(&text, &project_id),
            Some(Some(Err(e))) => {
                tracing::warn!(project_id = %project_id, error = %e, "Notification connection error");
                break;
            }
            Some(None) => {
                tracing::info!(project_id = %project_id, "Notification connection closed");
                break;
            }
        }
    }
    hub.on_closed(epoch);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
