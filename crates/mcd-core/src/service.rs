//! Memcached service adapter
//!
//! Every operation is a fixed shell command sent through the
//! [`CommandExecutor`]. Mutating operations propagate executor errors;
//! the read-only queries (`status`, `version`, `is_installed`) log a warning
//! and fall back to a conservative answer.

use crate::config::MemcachedConfig;
use crate::error::PluginError;
use crate::events::{ServiceEvent, ServiceRecord};
use async_trait::async_trait;
use mcd_exec::CommandExecutor;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Service id
pub const SERVICE_ID: &str = "memcached";

/// Service type shared by in-memory stores
pub const SERVICE_TYPE: &str = "memory_database";

/// Display name
pub const DISPLAY_NAME: &str = "Memcached";

/// Distribution packages installed and removed together
pub const PACKAGES: &[&str] = &["memcached", "libmemcached-tools"];

/// Reported when no version can be determined
pub const UNKNOWN_VERSION: &str = "unknown";

/// Runtime state of the unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Unit is active
    Running,
    /// Unit is anything but active
    Stopped,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
        })
    }
}

/// Lifecycle of one managed service
#[async_trait]
pub trait ServiceHandler: Send + Sync {
    /// Identity used in events
    fn record(&self) -> ServiceRecord;

    /// Install packages, enable and start the unit
    async fn install(&self) -> Result<(), PluginError>;

    /// Stop and remove packages; `false` if nothing was installed
    async fn uninstall(&self) -> Result<bool, PluginError>;

    /// Start the unit
    async fn start(&self) -> Result<(), PluginError>;

    /// Stop the unit
    async fn stop(&self) -> Result<(), PluginError>;

    /// Restart the unit
    async fn restart(&self) -> Result<(), PluginError>;

    /// Enable the unit at boot
    async fn enable(&self) -> Result<(), PluginError>;

    /// Disable the unit at boot
    async fn disable(&self) -> Result<(), PluginError>;

    /// Installed version, or a fallback
    async fn version(&self) -> String;

    /// Whether the unit is active
    async fn status(&self) -> ServiceStatus;

    /// Whether the package is installed
    async fn is_installed(&self) -> bool;
}

/// Memcached on a Debian-family host
#[derive(Clone)]
pub struct Memcached {
    exec: Arc<dyn CommandExecutor>,
    settings: MemcachedConfig,
    known_version: Option<String>,
}

impl fmt::Debug for Memcached {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memcached")
            .field("settings", &self.settings)
            .field("known_version", &self.known_version)
            .finish_non_exhaustive()
    }
}

impl Memcached {
    /// Adapter for the host behind `exec`
    #[must_use]
    pub fn new(exec: Arc<dyn CommandExecutor>, settings: MemcachedConfig) -> Self {
        Self {
            exec,
            settings,
            known_version: None,
        }
    }

    /// Version to report when detection fails
    #[must_use]
    pub fn with_known_version(mut self, version: impl Into<String>) -> Self {
        self.known_version = Some(version.into());
        self
    }

    /// Host settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &MemcachedConfig {
        &self.settings
    }

    /// Executor shared with actions that touch the same host
    #[inline]
    #[must_use]
    pub fn executor(&self) -> Arc<dyn CommandExecutor> {
        Arc::clone(&self.exec)
    }

    fn systemctl(&self, verb: &str) -> String {
        format!(
            "{}systemctl {verb} {}",
            self.settings.sudo(),
            shell_words::quote(&self.settings.unit)
        )
    }

    fn apt(&self, args: &str) -> String {
        format!("{}apt-get {args}", self.settings.sudo())
    }

    async fn run(&self, command: &str, label: &str) -> Result<(), PluginError> {
        tracing::debug!(label, command, "running");
        self.exec.exec(command, label).await?;
        Ok(())
    }

    async fn unit_verb(&self, verb: &str) -> Result<(), PluginError> {
        self.run(&self.systemctl(verb), &format!("{SERVICE_ID}-{verb}"))
            .await?;
        tracing::info!(unit = %self.settings.unit, verb, "unit updated");
        Ok(())
    }

    fn fallback_version(&self) -> String {
        self.known_version
            .clone()
            .unwrap_or_else(|| UNKNOWN_VERSION.to_string())
    }
}

/// Version from the first line of `memcached -h`
#[must_use]
pub fn parse_version(output: &str) -> Option<String> {
    let version = output.lines().next()?.replace("memcached", "");
    let version = version.trim();
    (!version.is_empty()).then(|| version.to_string())
}

/// Whether `dpkg -s` status output marks the package installed
#[inline]
#[must_use]
pub fn parse_installed(output: &str) -> bool {
    output.to_lowercase().contains("install ok installed")
}

#[async_trait]
impl ServiceHandler for Memcached {
    fn record(&self) -> ServiceRecord {
        ServiceRecord::new(SERVICE_ID, SERVICE_TYPE, DISPLAY_NAME)
    }

    async fn install(&self) -> Result<(), PluginError> {
        let packages = PACKAGES.join(" ");
        self.run(&self.apt("update -y"), "memcached-install-update")
            .await?;
        self.run(
            &self.apt(&format!("install -y {packages}")),
            "memcached-install-packages",
        )
        .await?;
        self.run(&self.systemctl("enable"), "memcached-install-enable")
            .await?;
        self.run(&self.systemctl("restart"), "memcached-install-restart")
            .await?;
        tracing::info!(packages = %packages, "memcached installed");
        Ok(())
    }

    async fn uninstall(&self) -> Result<bool, PluginError> {
        if !self.is_installed().await {
            tracing::info!("memcached not installed, nothing to remove");
            return Ok(false);
        }
        let packages = PACKAGES.join(" ");
        self.run(
            &format!("{} || true", self.systemctl("stop")),
            "memcached-uninstall-stop",
        )
        .await?;
        self.run(
            &self.apt(&format!("remove -y {packages}")),
            "memcached-uninstall-packages",
        )
        .await?;
        self.run(&self.apt("autoremove -y"), "memcached-uninstall-autoremove")
            .await?;
        tracing::info!(packages = %packages, "memcached removed");
        Ok(true)
    }

    async fn start(&self) -> Result<(), PluginError> {
        self.unit_verb("start").await
    }

    async fn stop(&self) -> Result<(), PluginError> {
        self.unit_verb("stop").await
    }

    async fn restart(&self) -> Result<(), PluginError> {
        self.unit_verb("restart").await
    }

    async fn enable(&self) -> Result<(), PluginError> {
        self.unit_verb("enable").await
    }

    async fn disable(&self) -> Result<(), PluginError> {
        self.unit_verb("disable").await
    }

    async fn version(&self) -> String {
        match self.exec.exec("memcached -h | head -n 1", "memcached-version").await {
            Ok(out) => parse_version(&out.stdout).unwrap_or_else(|| self.fallback_version()),
            Err(e) => {
                tracing::warn!(error = %e, "version detection failed");
                self.fallback_version()
            }
        }
    }

    async fn status(&self) -> ServiceStatus {
        match self.exec.exec(&self.systemctl("is-active"), "memcached-status").await {
            Ok(out) if out.trimmed() == "active" => ServiceStatus::Running,
            Ok(_) => ServiceStatus::Stopped,
            Err(e) => {
                // is-active exits non-zero for every state but active
                if e.is_transport() {
                    tracing::warn!(error = %e, "status query failed");
                }
                ServiceStatus::Stopped
            }
        }
    }

    async fn is_installed(&self) -> bool {
        let command = format!("dpkg -s {SERVICE_ID} 2>/dev/null | grep -i ^status:");
        match self.exec.exec(&command, "memcached-installed").await {
            Ok(out) => parse_installed(&out.stdout),
            Err(e) => {
                if e.is_transport() {
                    tracing::warn!(error = %e, "package query failed");
                }
                false
            }
        }
    }
}

/// Mutating lifecycle operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceAction {
    /// Install and start
    Install,
    /// Stop and remove
    Uninstall,
    /// Start the unit
    Start,
    /// Stop the unit
    Stop,
    /// Restart the unit
    Restart,
    /// Enable at boot
    Enable,
    /// Disable at boot
    Disable,
}

impl ServiceAction {
    /// All actions
    pub const ALL: [Self; 7] = [
        Self::Install,
        Self::Uninstall,
        Self::Start,
        Self::Stop,
        Self::Restart,
        Self::Enable,
        Self::Disable,
    ];

    /// Lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Enable => "enable",
            Self::Disable => "disable",
        }
    }

    /// Run against `handler`, returning the event to broadcast, if any
    ///
    /// # Errors
    /// Propagates the handler's error unchanged
    pub async fn perform(
        self,
        handler: &dyn ServiceHandler,
    ) -> Result<Option<ServiceEvent>, PluginError> {
        match self {
            Self::Install => {
                handler.install().await?;
                Ok(Some(ServiceEvent::installed(handler.record())))
            }
            Self::Uninstall => Ok(handler
                .uninstall()
                .await?
                .then(|| ServiceEvent::uninstalled(handler.record()))),
            Self::Start => handler.start().await.map(|()| None),
            Self::Stop => handler.stop().await.map(|()| None),
            Self::Restart => handler.restart().await.map(|()| None),
            Self::Enable => handler.enable().await.map(|()| None),
            Self::Disable => handler.disable().await.map(|()| None),
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown service action `{s}`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_parsing() {
        assert_eq!(parse_version("memcached 1.6.14\n").as_deref(), Some("1.6.14"));
        assert_eq!(parse_version("  memcached  \n"), None);
        assert_eq!(parse_version(""), None);
    }

    #[test]
    fn installed_parsing() {
        assert!(parse_installed("Status: install ok installed\n"));
        assert!(parse_installed("STATUS: INSTALL OK INSTALLED"));
        assert!(!parse_installed("Status: deinstall ok config-files\n"));
    }

    #[test]
    fn action_names_round_trip() {
        for action in ServiceAction::ALL {
            assert_eq!(action.as_str().parse::<ServiceAction>().unwrap(), action);
        }
        assert!("reload".parse::<ServiceAction>().is_err());
    }

    #[test]
    fn status_display() {
        assert_eq!(ServiceStatus::Running.to_string(), "running");
        assert_eq!(
            serde_json::to_string(&ServiceStatus::Stopped).unwrap(),
            "\"stopped\""
        );
    }
}
