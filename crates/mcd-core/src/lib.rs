//! Memcached service plugin
//!
//! Lifecycle management and tuning of memcached on a host reached through a
//! [`CommandExecutor`](mcd_exec::CommandExecutor).
//!
//! # Core Concepts
//!
//! - [`Memcached`]: install, remove, control and query the service
//! - [`Tune`]: validated `-m`/`-p`/`-l` edits followed by one restart
//! - [`MemcachedPlugin`]: registers both with a [`PluginHost`]
//! - [`Registry`]: in-memory host that routes actions and events
//!
//! # Example
//!
//! ```rust,ignore
//! use mcd_core::prelude::*;
//!
//! let plugin = MemcachedPlugin::new(exec, MemcachedConfig::default());
//! let mut registry = Registry::new();
//! registry.boot(&plugin)?;
//!
//! let outcome = registry
//!     .run_action("memcached", "tune", &TuneRequest::new(256, 11211, "0.0.0.0")?.to_form())
//!     .await?;
//! println!("{}", outcome.message);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod events;
pub mod form;
pub mod plugin;
pub mod registry;
pub mod service;
pub mod tune;

pub use config::{AppConfig, ConfigError, MemcachedConfig, TargetConfig, DEFAULT_CONFIG_FILE};
pub use error::PluginError;
pub use events::{ServiceEvent, ServiceEventKind, ServiceRecord};
pub use form::{DynamicField, DynamicForm, FieldKind};
pub use plugin::{
    ActionHandler, ActionOutcome, EventListener, FeatureActionRegistration, FeatureRegistration,
    MemcachedPlugin, Plugin, PluginHost, ServiceTypeRegistration, ViewsRegistration,
};
pub use registry::{Manifest, Registry};
pub use service::{Memcached, ServiceAction, ServiceHandler, ServiceStatus};
pub use tune::{Tune, TuneRequest, ValidationErrors};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::{AppConfig, MemcachedConfig};
    pub use crate::error::PluginError;
    pub use crate::events::{ServiceEvent, ServiceEventKind};
    pub use crate::plugin::{ActionHandler, MemcachedPlugin, Plugin, PluginHost};
    pub use crate::registry::Registry;
    pub use crate::service::{Memcached, ServiceAction, ServiceHandler, ServiceStatus};
    pub use crate::tune::{Tune, TuneRequest};
}
