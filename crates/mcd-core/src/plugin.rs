//! Plugin contract and the Memcached plugin
//!
//! A host discovers the plugin, hands it a [`PluginHost`] in
//! [`Plugin::boot`], and the plugin registers its service type, feature,
//! actions, views and event listeners.

use crate::config::MemcachedConfig;
use crate::error::PluginError;
use crate::events::{ServiceEvent, ServiceEventKind};
use crate::form::DynamicForm;
use crate::service::{Memcached, ServiceHandler, DISPLAY_NAME, SERVICE_ID, SERVICE_TYPE};
use crate::tune::Tune;
use async_trait::async_trait;
use mcd_exec::CommandExecutor;
use mcd_flags::ApplyReport;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Name the plugin registers under
pub const PLUGIN_NAME: &str = "Memcached Service Plugin";

/// Plugin description
pub const PLUGIN_DESCRIPTION: &str =
    "Adds Memcached as a manageable service with config editing and tuning features.";

/// Feature id under which tuning is offered
pub const FEATURE_ID: &str = "memcached";

/// Feature description
pub const FEATURE_DESCRIPTION: &str = "Install, configure and tune Memcached on this server";

/// Action key of the tune action
pub const TUNE_ACTION: &str = "tune";

/// View namespace
pub const VIEWS_NAMESPACE: &str = "memcached-plugin";

/// Callback for a service lifecycle event
pub type EventListener = Box<dyn Fn(&ServiceEvent) + Send + Sync>;

/// Result of a feature action
#[derive(Debug)]
pub struct ActionOutcome {
    /// Message for the user
    pub message: String,
    /// Flag changes, for actions that edit config
    pub report: Option<ApplyReport>,
}

/// A form-driven feature action
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Display name
    fn name(&self) -> &str;

    /// Whether the action may run
    fn active(&self) -> bool {
        true
    }

    /// Input form
    fn form(&self) -> DynamicForm;

    /// Validate `input` and run
    async fn handle(&self, input: &BTreeMap<String, String>) -> Result<ActionOutcome, PluginError>;
}

/// Config file a service exposes for editing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigPathRegistration {
    /// Short name, e.g. `memcached.conf`
    pub name: String,
    /// Absolute path on the host
    pub path: String,
    /// Whether edits need `sudo`
    pub sudo: bool,
}

/// A service type and its handler
#[derive(Clone, Serialize)]
pub struct ServiceTypeRegistration {
    /// Service id
    pub id: String,
    /// Service type
    pub service_type: String,
    /// Display name
    pub label: String,
    /// Editable config files
    pub config_paths: Vec<ConfigPathRegistration>,
    #[serde(skip_serializing)]
    pub(crate) handler: Arc<dyn ServiceHandler>,
}

impl ServiceTypeRegistration {
    /// Registration backed by `handler`
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        service_type: impl Into<String>,
        label: impl Into<String>,
        handler: Arc<dyn ServiceHandler>,
    ) -> Self {
        Self {
            id: id.into(),
            service_type: service_type.into(),
            label: label.into(),
            config_paths: Vec::new(),
            handler,
        }
    }

    /// Expose a config file
    #[must_use]
    pub fn with_config_path(mut self, name: &str, path: &str, sudo: bool) -> Self {
        self.config_paths.push(ConfigPathRegistration {
            name: name.to_string(),
            path: path.to_string(),
            sudo,
        });
        self
    }

    /// Lifecycle handler
    #[inline]
    #[must_use]
    pub fn handler(&self) -> Arc<dyn ServiceHandler> {
        Arc::clone(&self.handler)
    }
}

impl fmt::Debug for ServiceTypeRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceTypeRegistration")
            .field("id", &self.id)
            .field("service_type", &self.service_type)
            .field("label", &self.label)
            .field("config_paths", &self.config_paths)
            .finish_non_exhaustive()
    }
}

/// A feature grouping actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureRegistration {
    /// Feature id
    pub id: String,
    /// Display name
    pub label: String,
    /// One-line description
    pub description: String,
}

/// An action offered under a feature
#[derive(Clone, Serialize)]
pub struct FeatureActionRegistration {
    /// Owning feature id
    pub feature: String,
    /// Action key
    pub action: String,
    /// Display name
    pub label: String,
    /// Whether the action may run
    pub active: bool,
    /// Input form
    pub form: DynamicForm,
    #[serde(skip_serializing)]
    pub(crate) handler: Arc<dyn ActionHandler>,
}

impl FeatureActionRegistration {
    /// Registration for `handler` under `feature`/`action`
    #[must_use]
    pub fn new(
        feature: impl Into<String>,
        action: impl Into<String>,
        handler: Arc<dyn ActionHandler>,
    ) -> Self {
        Self {
            feature: feature.into(),
            action: action.into(),
            label: handler.name().to_string(),
            active: handler.active(),
            form: handler.form(),
            handler,
        }
    }

    /// Action handler
    #[inline]
    #[must_use]
    pub fn handler(&self) -> Arc<dyn ActionHandler> {
        Arc::clone(&self.handler)
    }
}

impl fmt::Debug for FeatureActionRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureActionRegistration")
            .field("feature", &self.feature)
            .field("action", &self.action)
            .field("label", &self.label)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

/// Template directory exposed under a namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewsRegistration {
    /// Namespace
    pub namespace: String,
    /// Directory relative to the plugin root
    pub path: String,
}

/// What a plugin may register during boot
pub trait PluginHost {
    /// Add a service type
    ///
    /// # Errors
    /// [`PluginError::Duplicate`] if the id is taken
    fn register_service_type(
        &mut self,
        registration: ServiceTypeRegistration,
    ) -> Result<(), PluginError>;

    /// Add a feature
    ///
    /// # Errors
    /// [`PluginError::Duplicate`] if the id is taken
    fn register_feature(&mut self, registration: FeatureRegistration) -> Result<(), PluginError>;

    /// Add an action to a registered feature
    ///
    /// # Errors
    /// [`PluginError::UnknownFeature`] or [`PluginError::Duplicate`]
    fn register_feature_action(
        &mut self,
        registration: FeatureActionRegistration,
    ) -> Result<(), PluginError>;

    /// Add a views namespace
    ///
    /// # Errors
    /// [`PluginError::Duplicate`] if the namespace is taken
    fn register_views(&mut self, registration: ViewsRegistration) -> Result<(), PluginError>;

    /// Subscribe to lifecycle events of `kind`
    fn listen(&mut self, kind: ServiceEventKind, listener: EventListener);
}

/// A discoverable plugin
pub trait Plugin: Send + Sync {
    /// Plugin name
    fn name(&self) -> &str;

    /// One-line description
    fn description(&self) -> &str;

    /// Register capabilities with the host
    ///
    /// # Errors
    /// Propagates the host's registration errors
    fn boot(&self, host: &mut dyn PluginHost) -> Result<(), PluginError>;

    /// Called once when the plugin is added
    ///
    /// # Errors
    /// Implementation-defined
    fn install(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called once when the plugin is removed
    ///
    /// # Errors
    /// Implementation-defined
    fn uninstall(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called when the plugin is switched on
    ///
    /// # Errors
    /// Implementation-defined
    fn enable(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called when the plugin is switched off
    ///
    /// # Errors
    /// Implementation-defined
    fn disable(&self) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Log lifecycle events of in-memory stores; `false` for other service types
pub fn log_service_event(event: &ServiceEvent) -> bool {
    if event.service.service_type != SERVICE_TYPE {
        return false;
    }
    match event.kind {
        ServiceEventKind::Installed => {
            tracing::info!(service_id = %event.service.id, "Memcached installed");
        }
        ServiceEventKind::Uninstalled => {
            tracing::info!(service_id = %event.service.id, "Memcached uninstalled");
        }
    }
    true
}

/// Memcached management for one host
#[derive(Clone)]
pub struct MemcachedPlugin {
    exec: Arc<dyn CommandExecutor>,
    settings: MemcachedConfig,
}

impl fmt::Debug for MemcachedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemcachedPlugin")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl MemcachedPlugin {
    /// Plugin managing the host behind `exec`
    #[must_use]
    pub fn new(exec: Arc<dyn CommandExecutor>, settings: MemcachedConfig) -> Self {
        Self { exec, settings }
    }

    /// Service adapter for this plugin's host
    #[must_use]
    pub fn service(&self) -> Memcached {
        Memcached::new(Arc::clone(&self.exec), self.settings.clone())
    }

    /// Tune action for this plugin's host
    #[must_use]
    pub fn tune(&self) -> Tune {
        Tune::new(Arc::clone(&self.exec), self.settings.clone())
    }
}

impl Plugin for MemcachedPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn description(&self) -> &str {
        PLUGIN_DESCRIPTION
    }

    fn boot(&self, host: &mut dyn PluginHost) -> Result<(), PluginError> {
        let conf_name = self
            .settings
            .config_path
            .rsplit('/')
            .next()
            .unwrap_or("memcached.conf")
            .to_string();

        host.register_service_type(
            ServiceTypeRegistration::new(
                SERVICE_ID,
                SERVICE_TYPE,
                DISPLAY_NAME,
                Arc::new(self.service()),
            )
            .with_config_path(&conf_name, &self.settings.config_path, self.settings.use_sudo),
        )?;

        host.register_feature(FeatureRegistration {
            id: FEATURE_ID.to_string(),
            label: DISPLAY_NAME.to_string(),
            description: FEATURE_DESCRIPTION.to_string(),
        })?;

        host.register_feature_action(FeatureActionRegistration::new(
            FEATURE_ID,
            TUNE_ACTION,
            Arc::new(self.tune()),
        ))?;

        host.register_views(ViewsRegistration {
            namespace: VIEWS_NAMESPACE.to_string(),
            path: "views".to_string(),
        })?;

        for kind in [ServiceEventKind::Installed, ServiceEventKind::Uninstalled] {
            host.listen(
                kind,
                Box::new(|event: &ServiceEvent| {
                    log_service_event(event);
                }),
            );
        }

        tracing::debug!(plugin = PLUGIN_NAME, "plugin booted");
        Ok(())
    }
}
