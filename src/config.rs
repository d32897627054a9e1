//! Per-client connection settings.

use crate::encoding::{default_encoder, Encoder};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// How long to wait before considering a command ignored.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(20);

/// How many reconnect-and-resend attempts a persistent client makes before
/// giving the server up as dead.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Connection settings for one RCON endpoint.
///
/// Supplied by the caller at construction and never mutated by the client.
///
/// ## Example
/// ```
/// use palrcon::config::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::new("play.example.com", 25575, "hunter2")
///     .with_command_timeout(Duration::from_secs(5))
///     .with_max_retries(1);
/// ```
#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    /// Upper bound on each command's wait for its response.
    pub command_timeout: Duration,
    /// Reconnect attempts after a transient disconnect. Zero disables
    /// retrying entirely.
    pub max_retries: u32,
    /// Body codec. Authentication packets always travel UTF-8 regardless.
    pub encoder: Arc<dyn Encoder>,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        ServerConfig {
            host: host.into(),
            port,
            password: password.into(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            encoder: default_encoder(),
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn Encoder>) -> Self {
        self.encoder = encoder;
        self
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .field("command_timeout", &self.command_timeout)
            .field("max_retries", &self.max_retries)
            .field("encoder", &self.encoder)
            .finish()
    }
}
