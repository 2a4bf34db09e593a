//! Updater errors

use mcd_exec::ExecError;
use std::fmt;

/// Step of the update procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Fetching the current file content
    Read,
    /// Rewriting the file with an existing flag line replaced
    Replace,
    /// Appending a missing flag line
    Append,
    /// Running the reload trigger
    Reload,
}

impl Phase {
    /// Lowercase name, used in operation labels
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Replace => "replace",
            Self::Append => "append",
            Self::Reload => "reload",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure while applying flag assignments
///
/// Flags applied before the failing step stay applied.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// A per-flag step failed
    #[error("{phase} of flag `{flag}` in {path} failed: {source}")]
    Step {
        /// Flag being applied
        flag: String,
        /// Failing phase
        phase: Phase,
        /// Target file
        path: String,
        /// Executor failure
        #[source]
        source: ExecError,
    },

    /// The reload trigger failed after every flag was applied
    #[error("reload `{label}` failed: {source}")]
    Reload {
        /// Reload operation label
        label: String,
        /// Executor failure
        #[source]
        source: ExecError,
    },
}

impl UpdateError {
    /// Phase that failed
    #[inline]
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            Self::Step { phase, .. } => *phase,
            Self::Reload { .. } => Phase::Reload,
        }
    }

    /// Flag that was being applied, `None` for reload failures
    #[inline]
    #[must_use]
    pub fn flag(&self) -> Option<&str> {
        match self {
            Self::Step { flag, .. } => Some(flag),
            Self::Reload { .. } => None,
        }
    }

    /// Underlying executor error
    #[must_use]
    pub fn exec_error(&self) -> &ExecError {
        match self {
            Self::Step { source, .. } | Self::Reload { source, .. } => source,
        }
    }
}
