//! Job status event distribution.
//!
//! - [`bus`] -- server-side in-process broadcast of [`JobStatusEvent`]s.
//! - [`hub`] -- the client-side [`NotificationHub`]: one shared WebSocket
//!   connection per process, fanned out to per-job and per-project
//!   callbacks, with automatic reconnection.
//! - [`subscription`] -- RAII registration surface for UI views.
//!
//! [`JobStatusEvent`]: cryoflow_core::job_events::JobStatusEvent

pub mod bus;
pub mod config;
pub mod hub;
pub mod messages;
pub mod reconnect;
pub mod registry;
pub mod subscription;
pub mod transport;

pub use bus::EventBus;
pub use config::HubConfig;
pub use hub::{ConnectionState, NotificationHub};
pub use registry::{Callback, CallbackFailure, FailureHook, SubscriptionRegistry};
pub use subscription::{ClientSubscriptions, SubscriptionGuard};
pub use transport::{Connection, Connector, TransportError, WsConnector};
