//! Executor error types

/// Failure of a single remote command
///
/// Every variant carries the operation label the command was issued under,
/// so a failure can be traced back to the step that produced it.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The transport process could not be started
    #[error("{label}: failed to spawn `{program}`: {source}")]
    Spawn {
        /// Operation label
        label: String,
        /// Program that failed to start
        program: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited unsuccessfully
    #[error("{label}: command exited with status {}: {}", code_display(.code), .stderr.trim())]
    NonZeroExit {
        /// Operation label
        label: String,
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
        /// Captured standard output
        stdout: String,
        /// Captured standard error
        stderr: String,
    },

    /// The remote host could not be reached
    #[error("{label}: connection failed: {}", .message.trim())]
    Connection {
        /// Operation label
        label: String,
        /// Transport diagnostic
        message: String,
    },

    /// The command did not finish in time
    #[error("{label}: timed out after {secs}s")]
    Timeout {
        /// Operation label
        label: String,
        /// Timeout that elapsed
        secs: u64,
    },

    /// IO error while waiting for the command
    #[error("{label}: io error: {source}")]
    Io {
        /// Operation label
        label: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

impl ExecError {
    /// Operation label of the failing command
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Spawn { label, .. }
            | Self::NonZeroExit { label, .. }
            | Self::Connection { label, .. }
            | Self::Timeout { label, .. }
            | Self::Io { label, .. } => label,
        }
    }

    /// Exit code, if the command ran to completion
    #[inline]
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { code, .. } => *code,
            _ => None,
        }
    }

    /// Whether the failure happened before the command reached the host
    #[inline]
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Spawn { .. } | Self::Connection { .. } | Self::Timeout { .. }
        )
    }

    /// Build a non-zero exit error
    pub fn non_zero(
        label: impl Into<String>,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::NonZeroExit {
            label: label.into(),
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

fn code_display(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_zero_display_includes_label_and_code() {
        let err = ExecError::non_zero("memcached-start", Some(5), "", "Unit not found\n");
        let msg = err.to_string();
        assert!(msg.contains("memcached-start"));
        assert!(msg.contains("status 5"));
        assert!(msg.ends_with("Unit not found"));
    }

    #[test]
    fn signal_exit_is_displayed() {
        let err = ExecError::non_zero("x", None, "", "");
        assert!(err.to_string().contains("status signal"));
    }

    #[test]
    fn label_is_available_for_every_variant() {
        let errors = [
            ExecError::non_zero("a", Some(1), "", ""),
            ExecError::Connection {
                label: "a".into(),
                message: "refused".into(),
            },
            ExecError::Timeout {
                label: "a".into(),
                secs: 3,
            },
        ];
        for err in &errors {
            assert_eq!(err.label(), "a");
        }
    }

    #[test]
    fn transport_classification() {
        assert!(ExecError::Timeout {
            label: "t".into(),
            secs: 1
        }
        .is_transport());
        assert!(!ExecError::non_zero("t", Some(1), "", "").is_transport());
        assert_eq!(ExecError::non_zero("t", Some(7), "", "").exit_code(), Some(7));
    }
}
