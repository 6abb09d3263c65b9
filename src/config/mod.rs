//! Application configuration.
//!
//! [`AppConfig`] is built in code or loaded from TOML. Every field has a default, so an
//! empty file is a valid configuration:
//!
//! ```toml
//! address = "0.0.0.0:8080"
//! max_body_bytes = 1048576
//! request_timeout_ms = 5000
//! respond_on_unexpected_error = true
//! static_root = "public"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default cap on an aggregated request body (8 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Errors produced while loading or validating an [`AppConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Settings shared by the dispatcher, the server, and request-time collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Address the server binds to.
    pub address: String,

    /// Largest request body accepted before answering `413`. `None` disables the cap.
    pub max_body_bytes: Option<usize>,

    /// Per-request deadline in milliseconds. `None` lets a request run indefinitely.
    pub request_timeout_ms: Option<u64>,

    /// Answer unexpected (non-HTTP) errors with a `500` JSON body instead of leaving the
    /// request unanswered.
    pub respond_on_unexpected_error: bool,

    /// Directory served by [`statics`](crate::statics).
    pub static_root: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_owned(),
            max_body_bytes: Some(DEFAULT_MAX_BODY_BYTES),
            request_timeout_ms: None,
            respond_on_unexpected_error: false,
            static_root: None,
        }
    }
}

impl AppConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks value constraints that the type system cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid(format!(
                "address `{}` is not a socket address",
                self.address
            )));
        }
        if self.max_body_bytes == Some(0) {
            return Err(ConfigError::invalid("max_body_bytes must be greater than zero"));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(ConfigError::invalid(
                "request_timeout_ms must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    #[must_use]
    pub fn with_max_body_bytes(mut self, limit: Option<usize>) -> Self {
        self.max_body_bytes = limit;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    #[must_use]
    pub fn respond_on_unexpected_error(mut self, enabled: bool) -> Self {
        self.respond_on_unexpected_error = enabled;
        self
    }

    #[must_use]
    pub fn with_static_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.static_root = Some(root.into());
        self
    }
}
