//! SSH executor backed by the system `ssh` client
//!
//! Authentication, host key checking and connection reuse are left to the
//! user's ssh configuration. `BatchMode=yes` makes a missing credential fail
//! fast instead of prompting.

use crate::error::ExecError;
use crate::executor::{CommandExecutor, ExecOutput};
use crate::process::{self, Transport};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

/// Where to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    /// Host name or address
    pub host: String,
    /// Login user, ssh default when absent
    pub user: Option<String>,
    /// TCP port, ssh default when absent
    pub port: Option<u16>,
    /// Private key file
    pub identity_file: Option<PathBuf>,
}

impl SshTarget {
    /// Target a host with ssh defaults
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: None,
            port: None,
            identity_file: None,
        }
    }

    /// Set the login user
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the identity file
    #[must_use]
    pub fn with_identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    /// `user@host` or `host`
    #[must_use]
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }
}

/// Runs commands on a remote host over ssh
#[derive(Debug, Clone)]
pub struct SshExecutor {
    target: SshTarget,
    program: String,
    timeout: Duration,
}

impl SshExecutor {
    /// Create an executor for `target`
    #[must_use]
    pub fn new(target: SshTarget) -> Self {
        Self {
            target,
            program: "ssh".to_string(),
            timeout: crate::DEFAULT_TIMEOUT,
        }
    }

    /// Use a different ssh binary
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Set the per-command timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Target this executor connects to
    #[inline]
    #[must_use]
    pub fn target(&self) -> &SshTarget {
        &self.target
    }

    /// Arguments passed to the ssh binary for `command`
    #[must_use]
    pub fn args(&self, command: &str) -> Vec<String> {
        let mut args = vec!["-o".to_string(), "BatchMode=yes".to_string()];
        if let Some(port) = self.target.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        if let Some(identity) = &self.target.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args.push(self.target.destination());
        args.push("--".to_string());
        args.push(command.to_string());
        args
    }
}

#[async_trait::async_trait]
impl CommandExecutor for SshExecutor {
    async fn exec(&self, command: &str, label: &str) -> Result<ExecOutput, ExecError> {
        tracing::debug!(label, host = %self.target.host, command, "exec ssh");
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(command));
        process::run(cmd, &self.program, label, self.timeout, Transport::Ssh).await
    }
}
