//! Client configuration.
//!
//! Provides layered configuration loading with priority:
//! 1. Default values (hardcoded)
//! 2. Optional config file
//! 3. Environment variables (highest priority, `KEEPER_` prefix)
//!
//! Most callers construct a [`ClientConfig`] through the builder instead
//! of loading files.

use std::time::Duration;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;

use crate::Result;

/// Tunables of one [`crate::SessionClient`]
#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    /// Comma-separated `host:port` list of ensemble servers
    #[serde(default = "default_servers")]
    pub servers: String,

    /// Whether an expired session is transparently replaced by a fresh
    /// connect. With this disabled the client stays in the expired state
    /// and every subsequent call fails with the transport's error for a
    /// dead handle.
    #[serde(default = "default_reconnect")]
    pub reconnect: bool,

    /// Session timeout requested from the ensemble (unit: milliseconds).
    /// The ensemble may negotiate a different value.
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            servers: default_servers(),
            reconnect: default_reconnect(),
            session_timeout_ms: default_session_timeout_ms(),
        }
    }
}

impl ClientConfig {
    /// Create a configured builder with the given server list
    pub fn builder(servers: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: ClientConfig {
                servers: servers.into(),
                ..ClientConfig::default()
            },
        }
    }

    /// Load configuration from an optional file with environment-variable
    /// overrides (e.g. `KEEPER_SERVERS`, `KEEPER_RECONNECT`).
    ///
    /// # Errors
    /// - [`crate::Error::Config`] for a missing named file or a value
    ///   that fails deserialization
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        builder = match path {
            Some(path) => builder.add_source(File::with_name(path).required(true)),
            None => builder.add_source(File::with_name("config/keeper").required(false)),
        };

        builder = builder.add_source(Environment::with_prefix("KEEPER").try_parsing(true));

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }
}

pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Enable/disable transparent reconnect after session expiry
    /// (default: enabled)
    pub fn reconnect(
        mut self,
        reconnect: bool,
    ) -> Self {
        self.config.reconnect = reconnect;
        self
    }

    /// Set the requested session timeout (default: 10s)
    pub fn session_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.session_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

fn default_servers() -> String {
    "127.0.0.1:2181".to_string()
}

fn default_reconnect() -> bool {
    true
}

fn default_session_timeout_ms() -> u64 {
    10_000
}
