use std::time::Duration;

use cryoflow_core::job_events::WS_PATH;

/// Delay between a lost connection and the next attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Notification hub configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Full WebSocket URL, e.g. `ws://localhost:3000/ws`.
    pub endpoint: String,
    /// Fixed delay before every reconnection attempt. There is no backoff
    /// and no attempt limit.
    pub reconnect_delay: Duration,
}

impl HubConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default     |
    /// |-------------------------|-------------|
    /// | `NOTIFY_HOST`           | `localhost` |
    /// | `NOTIFY_PORT`           | `3000`      |
    /// | `NOTIFY_SECURE`         | `false`     |
    /// | `NOTIFY_RECONNECT_SECS` | `5`         |
    pub fn from_env() -> Self {
        let host = std::env::var("NOTIFY_HOST").unwrap_or_else(|_| "localhost".into());

        let port: u16 = std::env::var("NOTIFY_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("NOTIFY_PORT must be a valid u16");

        let secure = std::env::var("NOTIFY_SECURE")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let reconnect_secs: u64 = std::env::var("NOTIFY_RECONNECT_SECS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("NOTIFY_RECONNECT_SECS must be a valid u64");

        Self::new(endpoint_url(secure, &host, port))
            .with_reconnect_delay(Duration::from_secs(reconnect_secs))
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::new(endpoint_url(false, "localhost", 3000))
    }
}

/// `ws://host:port/ws`, or `wss://` when `secure`.
pub fn endpoint_url(secure: bool, host: &str, port: u16) -> String {
    let scheme = if secure { "wss" } else { "ws" };
    format!("{scheme}://{host}:{port}{WS_PATH}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_follows_page_security() {
        assert_eq!(endpoint_url(false, "cluster-ui", 8080), "ws://cluster-ui:8080/ws");
        assert_eq!(endpoint_url(true, "cryo.example.org", 443), "wss://cryo.example.org:443/ws");
    }

    #[test]
    fn default_delay_is_five_seconds() {
        let config = HubConfig::default();
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.endpoint, "ws://localhost:3000/ws");
    }
}
