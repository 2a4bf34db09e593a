//! Local shell executor

use crate::error::ExecError;
use crate::executor::{CommandExecutor, ExecOutput};
use crate::process::{self, Transport};
use std::time::Duration;
use tokio::process::Command;

/// Runs commands with `sh -c` on this machine
///
/// Used when the managed host is the machine the tool runs on.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    shell: String,
    timeout: Duration,
}

impl LocalExecutor {
    /// Create an executor using `/bin/sh`
    #[must_use]
    pub fn new() -> Self {
        Self {
            shell: "/bin/sh".to_string(),
            timeout: crate::DEFAULT_TIMEOUT,
        }
    }

    /// Use a different shell binary
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Set the per-command timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CommandExecutor for LocalExecutor {
    async fn exec(&self, command: &str, label: &str) -> Result<ExecOutput, ExecError> {
        tracing::debug!(label, command, "exec local");
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(command);
        process::run(cmd, &self.shell, label, self.timeout, Transport::Local).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout() {
        let exec = LocalExecutor::new();
        let out = exec.exec("echo hello", "echo").await.unwrap();
        assert_eq!(out.trimmed(), "hello");
        assert_eq!(out.exit_code, Some(0));
    }

    #[tokio::test]
    async fn keeps_non_utf8_stdout_bytes() {
        let exec = LocalExecutor::new();
        let out = exec.exec(r"printf 'caf\351\n'", "latin1").await.unwrap();
        assert_eq!(out.stdout_bytes, b"caf\xe9\n");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let exec = LocalExecutor::new();
        let err = exec.exec("echo boom >&2; exit 3", "fail").await.unwrap_err();
        match err {
            ExecError::NonZeroExit { code, stderr, label, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr.trim(), "boom");
                assert_eq!(label, "fail");
            }
            other => panic!("expected NonZeroExit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exit_255_is_not_a_connection_error_locally() {
        let exec = LocalExecutor::new();
        let err = exec.exec("exit 255", "local").await.unwrap_err();
        assert_eq!(err.exit_code(), Some(255));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let exec = LocalExecutor::new().with_timeout(Duration::from_millis(100));
        let err = exec.exec("sleep 5", "slow").await.unwrap_err();
        assert!(matches!(err, ExecError::Timeout { .. }));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn missing_shell_is_a_spawn_error() {
        let exec = LocalExecutor::new().with_shell("/nonexistent/shell");
        let err = exec.exec("true", "spawn").await.unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }
}
