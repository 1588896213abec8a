//! Server configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Server configuration
///
/// Every key is optional in TOML; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Transport bind host
    pub host: String,
    /// Transport bind port
    pub port: u16,
    /// Messages queued per session before it is treated as stalled
    pub outbound_queue_capacity: usize,
    /// Recent mutations kept for diagnostics
    pub mutation_log_capacity: usize,
    /// Default tracing filter for the binary
    pub log_level: String,
    /// Echo viewer-originated value changes back to their origin
    pub echo_to_origin: bool,
}

impl ServerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed TOML or unknown value types.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    /// Reject values the server cannot run with
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        if self.outbound_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "outbound_queue_capacity must be at least 1".into(),
            ));
        }
        if self.mutation_log_capacity == 0 {
            return Err(ConfigError::Invalid(
                "mutation_log_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Socket address to bind the transport to
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if host and port do not form an address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|err| ConfigError::Invalid(format!("bad bind address: {err}")))
    }

    /// With bind host
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// With bind port
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// With per-session outbound queue capacity
    #[inline]
    #[must_use]
    pub fn with_outbound_queue_capacity(mut self, capacity: usize) -> Self {
        self.outbound_queue_capacity = capacity;
        self
    }

    /// With mutation log capacity
    #[inline]
    #[must_use]
    pub fn with_mutation_log_capacity(mut self, capacity: usize) -> Self {
        self.mutation_log_capacity = capacity;
        self
    }

    /// With default log level
    #[inline]
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// With echo of viewer changes to their origin
    #[inline]
    #[must_use]
    pub fn with_echo_to_origin(mut self, echo: bool) -> Self {
        self.echo_to_origin = echo;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            outbound_queue_capacity: 8192,
            mutation_log_capacity: 1024,
            log_level: "info".to_string(),
            echo_to_origin: false,
        }
    }
}
