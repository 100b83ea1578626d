use std::path::{Path, PathBuf};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Directory holding one subdirectory per project, always absolute
    /// (default: the working directory).
    pub projects_root: PathBuf,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `PROJECTS_ROOT`        | `.`                        |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let projects_root = absolute_root(
            std::env::var("PROJECTS_ROOT").unwrap_or_else(|_| ".".into()),
        )
        .expect("PROJECTS_ROOT must resolve to an absolute path");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            projects_root,
            cors_origins,
            request_timeout_secs,
        }
    }

    /// Directory of `project_id` on the shared filesystem.
    pub fn project_root(&self, project_id: &str) -> PathBuf {
        self.projects_root.join(project_id)
    }
}

/// Anchor `raw` at the working directory when it is relative.
fn absolute_root(raw: impl AsRef<Path>) -> std::io::Result<PathBuf> {
    std::path::absolute(raw)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
