//! WebSocket endpoint the client-side notification hubs connect to.
//!
//! Provides connection management, heartbeat pings, the relay from the
//! event bus to subscribed connections, and the HTTP upgrade handler.

mod handler;
mod heartbeat;
pub mod manager;
mod relay;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
pub use relay::start_relay;
