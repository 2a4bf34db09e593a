//! Remote command execution
//!
//! Every Memcached operation is a shell command string run on the managed
//! host. This crate provides the capability that runs them:
//!
//! - [`CommandExecutor`]: the trait every operation is written against
//! - [`SshExecutor`]: runs commands through the system `ssh` client
//! - [`LocalExecutor`]: runs commands with the local `sh`
//! - [`DryRunExecutor`]: records commands without running anything
//!
//! # Example
//!
//! ```rust,ignore
//! use mcd_exec::{CommandExecutor, SshExecutor, SshTarget};
//!
//! let exec = SshExecutor::new(SshTarget::new("10.0.0.5").with_user("root"));
//! let out = exec.exec("sudo systemctl is-active memcached", "memcached-status").await?;
//! println!("{}", out.trimmed());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod dry_run;
mod error;
mod executor;
mod local;
mod process;
mod ssh;

pub use dry_run::{DryRunExecutor, RecordedCommand};
pub use error::ExecError;
pub use executor::{CommandExecutor, ExecOutput};
pub use local::LocalExecutor;
pub use ssh::{SshExecutor, SshTarget};

/// Default per-command timeout
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
