//! Child process plumbing shared by the local and ssh executors

use crate::error::ExecError;
use crate::executor::ExecOutput;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Exit status `ssh` reserves for its own failures
pub(crate) const SSH_TRANSPORT_EXIT: i32 = 255;

/// How a non-zero exit should be classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transport {
    /// Any non-zero exit is the command's own failure
    Local,
    /// Exit 255 means the connection failed
    Ssh,
}

/// Spawn `cmd`, wait up to `timeout`, and capture its output
pub(crate) async fn run(
    mut cmd: Command,
    program: &str,
    label: &str,
    timeout: Duration,
    transport: Transport,
) -> Result<ExecOutput, ExecError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|source| ExecError::Spawn {
        label: label.to_string(),
        program: program.to_string(),
        source,
    })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(ExecError::Io {
                label: label.to_string(),
                source,
            })
        }
        Err(_) => {
            return Err(ExecError::Timeout {
                label: label.to_string(),
                secs: timeout.as_secs(),
            })
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let code = output.status.code();

    if output.status.success() {
        return Ok(ExecOutput {
            stdout,
            stdout_bytes: output.stdout,
            stderr,
            exit_code: code,
        });
    }

    if transport == Transport::Ssh && code == Some(SSH_TRANSPORT_EXIT) {
        return Err(ExecError::Connection {
            label: label.to_string(),
            message: stderr,
        });
    }

    Err(ExecError::NonZeroExit {
        label: label.to_string(),
        code,
        stdout,
        stderr,
    })
}
