//! Configuration management

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ident_proto::consts::{AGENT_VERSION, MAX_MESSAGE_SIZE, PROTOCOL_VERSION};

/// Largest frame size accepted by `validate` (1MB).
pub const MAX_CONFIGURABLE_MESSAGE_SIZE: usize = 1024 * 1024;

/// Longest accepted per-operation I/O timeout.
pub const MAX_IO_TIMEOUT_SECS: u64 = 3600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Identify service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifyConfig {
    /// Protocol revision advertised in identify responses
    pub protocol_version: String,
    /// Agent string advertised in identify responses
    pub agent_version: String,
    /// Largest frame read or written, in bytes
    pub max_message_size: usize,
    /// Deadline for each stream read/write; 0 disables
    pub io_timeout_secs: u64,
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            agent_version: AGENT_VERSION.to_string(),
            max_message_size: MAX_MESSAGE_SIZE,
            io_timeout_secs: 10,
        }
    }
}

impl IdentifyConfig {
    /// Load configuration: defaults, then the TOML file named by
    /// `IDENT_CONFIG`, then `IDENT_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("IDENT_CONFIG") {
            Ok(path) => Self::from_toml_file(path)?,
            Err(_) => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Apply `IDENT_*` overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("IDENT_PROTOCOL_VERSION") {
            self.protocol_version = v;
        }

        if let Some(v) = lookup("IDENT_AGENT_VERSION") {
            self.agent_version = v;
        }

        if let Some(v) = lookup("IDENT_MAX_MESSAGE_SIZE") {
            self.max_message_size = v
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("Invalid IDENT_MAX_MESSAGE_SIZE: {}", e)))?;
        }

        if let Some(v) = lookup("IDENT_IO_TIMEOUT_SECS") {
            self.io_timeout_secs = v
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("Invalid IDENT_IO_TIMEOUT_SECS: {}", e)))?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol_version.is_empty() {
            return Err(ConfigError::Invalid("protocol_version must not be empty".to_string()));
        }

        if self.agent_version.is_empty() {
            return Err(ConfigError::Invalid("agent_version must not be empty".to_string()));
        }

        if self.max_message_size == 0 || self.max_message_size > MAX_CONFIGURABLE_MESSAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "max_message_size must be in 1..={}",
                MAX_CONFIGURABLE_MESSAGE_SIZE
            )));
        }

        if self.io_timeout_secs > MAX_IO_TIMEOUT_SECS {
            return Err(ConfigError::Invalid(format!(
                "io_timeout_secs must be <= {}",
                MAX_IO_TIMEOUT_SECS
            )));
        }

        Ok(())
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        match self.io_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
