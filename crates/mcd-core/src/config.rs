//! Configuration
//!
//! Loaded from a TOML file. Every field has a default, so an empty file (or
//! no file at all, via [`AppConfig::load_or_default`]) describes a local
//! host with the stock Debian memcached layout.

use mcd_exec::SshTarget;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name
pub const DEFAULT_CONFIG_FILE: &str = "memcached-plugin.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Host to manage
    pub target: TargetConfig,
    /// Memcached layout on that host
    pub memcached: MemcachedConfig,
}

/// Managed host connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    /// SSH host; commands run locally when absent
    pub host: Option<String>,
    /// SSH user
    pub user: Option<String>,
    /// SSH port
    pub port: Option<u16>,
    /// SSH private key
    pub identity_file: Option<PathBuf>,
    /// Per-command timeout in seconds
    pub timeout_secs: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: None,
            user: None,
            port: None,
            identity_file: None,
            timeout_secs: mcd_exec::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl TargetConfig {
    /// Per-command timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// SSH target, `None` for local execution
    #[must_use]
    pub fn ssh_target(&self) -> Option<SshTarget> {
        let host = self.host.as_ref()?;
        let mut target = SshTarget::new(host.clone());
        if let Some(user) = &self.user {
            target = target.with_user(user.clone());
        }
        if let Some(port) = self.port {
            target = target.with_port(port);
        }
        if let Some(identity) = &self.identity_file {
            target = target.with_identity_file(identity.clone());
        }
        Some(target)
    }
}

/// Memcached layout on the managed host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemcachedConfig {
    /// Config file edited by tuning
    pub config_path: String,
    /// systemd unit name
    pub unit: String,
    /// Prefix privileged commands with `sudo`
    pub use_sudo: bool,
}

impl Default for MemcachedConfig {
    fn default() -> Self {
        Self {
            config_path: "/etc/memcached.conf".to_string(),
            unit: "memcached".to_string(),
            use_sudo: true,
        }
    }
}

impl MemcachedConfig {
    /// `"sudo "` or `""`
    #[inline]
    #[must_use]
    pub fn sudo(&self) -> &'static str {
        if self.use_sudo {
            "sudo "
        } else {
            ""
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema
    #[error("cannot parse {path}: {source}")]
    Parse {
        /// Config file path
        path: PathBuf,
        /// TOML error
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Parse and validate TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file is missing, malformed or invalid
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file exists but cannot be used
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first bad field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.timeout_secs == 0 {
            return Err(ConfigError::Invalid("target.timeout_secs must be > 0".into()));
        }
        if matches!(&self.target.host, Some(h) if h.trim().is_empty()) {
            return Err(ConfigError::Invalid("target.host must not be empty".into()));
        }
        if self.memcached.unit.trim().is_empty() {
            return Err(ConfigError::Invalid("memcached.unit must not be empty".into()));
        }
        if self.memcached.config_path.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "memcached.config_path must not be empty".into(),
            ));
        }
        Ok(())
    }
}
