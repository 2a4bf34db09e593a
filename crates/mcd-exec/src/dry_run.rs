//! Dry-run executor

use crate::error::ExecError;
use crate::executor::{CommandExecutor, ExecOutput};
use parking_lot::Mutex;

/// A command captured by [`DryRunExecutor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    /// Operation label
    pub label: String,
    /// Command string
    pub command: String,
}

/// Records commands instead of running them
///
/// Every command succeeds. Output is empty unless a canned response was
/// registered for a command prefix with [`DryRunExecutor::respond`].
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    recorded: Mutex<Vec<RecordedCommand>>,
    responses: Vec<(String, String)>,
}

impl DryRunExecutor {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix` with `stdout`
    #[must_use]
    pub fn respond(mut self, prefix: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.responses.push((prefix.into(), stdout.into()));
        self
    }

    /// Commands recorded so far, in issue order
    #[must_use]
    pub fn recorded(&self) -> Vec<RecordedCommand> {
        self.recorded.lock().clone()
    }

    /// Drain the recorded commands
    pub fn take(&self) -> Vec<RecordedCommand> {
        std::mem::take(&mut *self.recorded.lock())
    }
}

#[async_trait::async_trait]
impl CommandExecutor for DryRunExecutor {
    async fn exec(&self, command: &str, label: &str) -> Result<ExecOutput, ExecError> {
        tracing::info!(label, command, "dry-run");
        self.recorded.lock().push(RecordedCommand {
            label: label.to_string(),
            command: command.to_string(),
        });
        let stdout = self
            .responses
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default();
        Ok(ExecOutput {
            stdout_bytes: stdout.clone().into_bytes(),
            stdout,
            stderr: String::new(),
            exit_code: None,
        })
    }
}
