//! Network configuration for the logware server.

use std::time::Duration;

/// Listener and HTTP stack settings. The per-call deadline lives in
/// `LogwareConfig::call_timeout`.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Bind address.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Allowed CORS origins. `"*"` allows any.
    pub cors_origins: Vec<String>,
    /// Maximum time shutdown waits for pending calls and dispatches.
    pub drain_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            drain_timeout: Duration::from_secs(30),
        }
    }
}
