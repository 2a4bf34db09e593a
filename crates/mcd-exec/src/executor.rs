//! The command execution capability

use crate::error::ExecError;
use std::sync::Arc;

/// Runs shell command strings on the managed host
///
/// Implementations return the captured output of a successful command and an
/// [`ExecError`] on non-zero exit or transport failure. The `label` names the
/// operation for logs and error reports; it has no effect on execution.
#[async_trait::async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Execute `command` and capture its output
    async fn exec(&self, command: &str, label: &str) -> Result<ExecOutput, ExecError>;
}

#[async_trait::async_trait]
impl<T: CommandExecutor + ?Sized> CommandExecutor for Arc<T> {
    async fn exec(&self, command: &str, label: &str) -> Result<ExecOutput, ExecError> {
        (**self).exec(command, label).await
    }
}

#[async_trait::async_trait]
impl<T: CommandExecutor + ?Sized> CommandExecutor for &T {
    async fn exec(&self, command: &str, label: &str) -> Result<ExecOutput, ExecError> {
        (**self).exec(command, label).await
    }
}

/// Captured output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Standard output, decoded lossily for display and parsing
    pub stdout: String,
    /// Standard output exactly as the command wrote it
    pub stdout_bytes: Vec<u8>,
    /// Standard error
    pub stderr: String,
    /// Exit code, `None` for executors that do not run anything
    pub exit_code: Option<i32>,
}

impl ExecOutput {
    /// Output with the given stdout and a zero exit code
    #[inline]
    #[must_use]
    pub fn stdout(stdout: impl Into<String>) -> Self {
        let stdout = stdout.into();
        Self {
            stdout_bytes: stdout.clone().into_bytes(),
            stdout,
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    /// Output with raw stdout bytes and a zero exit code
    #[must_use]
    pub fn from_bytes(stdout: Vec<u8>) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stdout_bytes: stdout,
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    /// Stdout with surrounding whitespace removed
    #[inline]
    #[must_use]
    pub fn trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Whether stdout is empty after trimming
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trimmed().is_empty()
    }
}
