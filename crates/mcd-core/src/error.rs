//! Error types for the Memcached plugin
//!
//! Provides error handling for:
//! - Form validation before any remote call
//! - Remote command failures
//! - Flag update failures with step identity
//! - Plugin registration conflicts

use crate::tune::ValidationErrors;
use mcd_exec::ExecError;
use mcd_flags::UpdateError;

/// Main plugin error type
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// Submitted values were rejected; nothing was executed
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// A remote command failed
    #[error("command failed: {0}")]
    Exec(#[from] ExecError),

    /// Applying config flags failed
    #[error("tuning failed: {0}")]
    Update(#[from] UpdateError),

    /// Something was registered twice
    #[error("duplicate {kind} registration: {key}")]
    Duplicate {
        /// Registration kind, e.g. `service type`
        kind: &'static str,
        /// Conflicting key
        key: String,
    },

    /// A feature action refers to a feature that was never registered
    #[error("feature `{0}` is not registered")]
    UnknownFeature(String),

    /// No service type with this id
    #[error("service type `{0}` is not registered")]
    UnknownService(String),

    /// No action with this name on the feature
    #[error("action `{action}` is not registered on feature `{feature}`")]
    UnknownAction {
        /// Feature id
        feature: String,
        /// Action name
        action: String,
    },

    /// The action exists but is currently disabled
    #[error("action `{0}` is not active")]
    Inactive(String),
}

impl PluginError {
    /// Whether the error was raised before anything ran on the host
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Whether the failure came from the remote host or the connection to it
    #[inline]
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Exec(_) | Self::Update(_))
    }
}
