//! Idempotent line-flag updater
//!
//! For every assignment, in order:
//! 1. read the current file
//! 2. replace the first line setting the flag, or append one if none does
//! 3. write the change back (nothing is written when the value already matches)
//!
//! After the last assignment the reload trigger runs exactly once. The file is
//! re-read per flag, so each flag's write is durable on its own and a failure
//! leaves earlier flags applied. Content is handled as raw bytes, so lines in
//! any encoding are written back unchanged. Inputs are not validated here.

use crate::assignment::FlagAssignment;
use crate::commands::FileCommands;
use crate::error::{Phase, UpdateError};
use crate::file::{ConfigFile, FlagOutcome};
use mcd_exec::{CommandExecutor, ExecError};

/// Command run once after all flags are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadTrigger {
    label: String,
    command: String,
}

impl ReloadTrigger {
    /// Arbitrary reload command
    pub fn new(label: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            command: command.into(),
        }
    }

    /// `systemctl restart <unit>`
    #[must_use]
    pub fn systemctl_restart(unit: &str, sudo: bool) -> Self {
        let prefix = if sudo { "sudo " } else { "" };
        Self::new(
            format!("{unit}-restart"),
            format!("{prefix}systemctl restart {}", shell_words::quote(unit)),
        )
    }

    /// Operation label
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Command string
    #[inline]
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }
}

/// Result of a successful [`FlagUpdater::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// Target file
    pub path: String,
    /// Per-assignment outcome, in application order
    pub outcomes: Vec<(FlagAssignment, FlagOutcome)>,
}

impl ApplyReport {
    /// Whether any assignment changed the file
    #[must_use]
    pub fn changed(&self) -> bool {
        self.outcomes.iter().any(|(_, o)| o.is_change())
    }

    /// Number of appended flag lines
    #[must_use]
    pub fn appended(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, FlagOutcome::Appended))
            .count()
    }

    /// Number of rewritten flag lines
    #[must_use]
    pub fn replaced(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, FlagOutcome::Replaced { .. }))
            .count()
    }
}

/// Applies flag assignments to one remote file
#[derive(Debug, Clone)]
pub struct FlagUpdater {
    path: String,
    commands: FileCommands,
    label_prefix: String,
}

impl FlagUpdater {
    /// Updater for the file at `path`, using `sudo`
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            commands: FileCommands::default(),
            label_prefix: "flags".to_string(),
        }
    }

    /// Toggle the `sudo` prefix on file commands
    #[must_use]
    pub fn with_sudo(mut self, sudo: bool) -> Self {
        self.commands = FileCommands::new(sudo);
        self
    }

    /// Prefix of operation labels, e.g. `memcached-tune` gives
    /// `memcached-tune-replace-m`
    #[must_use]
    pub fn with_label_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.label_prefix = prefix.into();
        self
    }

    /// Target file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Apply `assignments` in order, then run `reload` once
    ///
    /// # Errors
    /// Returns [`UpdateError::Step`] naming the flag and phase of the first
    /// failing command, or [`UpdateError::Reload`] if only the reload failed.
    /// The reload does not run when a flag step fails.
    pub async fn apply<E>(
        &self,
        assignments: &[FlagAssignment],
        reload: &ReloadTrigger,
        exec: &E,
    ) -> Result<ApplyReport, UpdateError>
    where
        E: CommandExecutor + ?Sized,
    {
        let mut outcomes = Vec::with_capacity(assignments.len());

        for assignment in assignments {
            let outcome = self.apply_one(assignment, exec).await?;
            tracing::info!(
                path = %self.path,
                flag = assignment.flag(),
                value = assignment.value(),
                ?outcome,
                "flag applied"
            );
            outcomes.push((assignment.clone(), outcome));
        }

        exec.exec(reload.command(), reload.label())
            .await
            .map_err(|source| UpdateError::Reload {
                label: reload.label().to_string(),
                source,
            })?;
        tracing::info!(path = %self.path, label = reload.label(), "reload triggered");

        Ok(ApplyReport {
            path: self.path.clone(),
            outcomes,
        })
    }

    async fn apply_one<E>(
        &self,
        assignment: &FlagAssignment,
        exec: &E,
    ) -> Result<FlagOutcome, UpdateError>
    where
        E: CommandExecutor + ?Sized,
    {
        let current = exec
            .exec(&self.commands.read(&self.path), &self.label(Phase::Read, assignment))
            .await
            .map_err(|e| self.step_error(assignment, Phase::Read, e))?;

        let mut file = ConfigFile::parse(&current.stdout_bytes);
        let separate = !file.ends_with_newline();
        let crlf = file.uses_crlf();
        let outcome = file.set_flag(assignment);

        let write = match &outcome {
            FlagOutcome::Unchanged { .. } => None,
            FlagOutcome::Replaced { .. } => Some((
                Phase::Replace,
                self.commands.overwrite(&self.path, &file.render()),
            )),
            FlagOutcome::Appended => {
                let mut line = assignment.line();
                if crlf {
                    line.push('\r');
                }
                Some((
                    Phase::Append,
                    self.commands.append(&self.path, &line, separate),
                ))
            }
        };

        if let Some((phase, command)) = write {
            exec.exec(&command, &self.label(phase, assignment))
                .await
                .map_err(|e| self.step_error(assignment, phase, e))?;
        }

        Ok(outcome)
    }

    fn label(&self, phase: Phase, assignment: &FlagAssignment) -> String {
        format!("{}-{}-{}", self.label_prefix, phase, assignment.slug())
    }

    fn step_error(&self, assignment: &FlagAssignment, phase: Phase, source: ExecError) -> UpdateError {
        UpdateError::Step {
            flag: assignment.flag().to_string(),
            phase,
            path: self.path.clone(),
            source,
        }
    }
}
