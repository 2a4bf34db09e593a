//! Idempotent line-flag updates
//!
//! Keeps `<flag> <value>` lines in a remote, possibly hand-edited config file
//! in sync with a set of assignments without owning the rest of the file.
//!
//! # Core Concepts
//!
//! - [`FlagAssignment`]: one `(flag, value)` pair
//! - [`ConfigFile`]: in-memory lines with the replace-or-append rule
//! - [`FlagUpdater`]: applies assignments through a
//!   [`CommandExecutor`](mcd_exec::CommandExecutor), then reloads
//!
//! # Example
//!
//! ```rust,ignore
//! use mcd_flags::{FlagAssignment, FlagUpdater, ReloadTrigger};
//!
//! let updater = FlagUpdater::new("/etc/memcached.conf");
//! let report = updater
//!     .apply(
//!         &[FlagAssignment::new("-m", 256), FlagAssignment::new("-l", "0.0.0.0")],
//!         &ReloadTrigger::systemctl_restart("memcached", true),
//!         &exec,
//!     )
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod assignment;
mod commands;
mod error;
mod file;
mod updater;

pub use assignment::{line_sets_flag, FlagAssignment};
pub use commands::FileCommands;
pub use error::{Phase, UpdateError};
pub use file::{ConfigFile, FlagOutcome};
pub use updater::{ApplyReport, FlagUpdater, ReloadTrigger};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
