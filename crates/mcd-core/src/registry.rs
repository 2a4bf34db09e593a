//! In-memory plugin host
//!
//! Provides [`Registry`], a [`PluginHost`] that keeps every registration,
//! rejects duplicate keys, routes actions to their handlers and fans events
//! out to listeners.

use crate::error::PluginError;
use crate::events::{ServiceEvent, ServiceEventKind};
use crate::plugin::{
    ActionOutcome, EventListener, FeatureActionRegistration, FeatureRegistration, Plugin,
    PluginHost, ServiceTypeRegistration, ViewsRegistration,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Registry of plugin capabilities
#[derive(Default)]
pub struct Registry {
    plugins: Vec<String>,
    service_types: BTreeMap<String, ServiceTypeRegistration>,
    features: BTreeMap<String, FeatureRegistration>,
    actions: BTreeMap<(String, String), FeatureActionRegistration>,
    views: BTreeMap<String, ViewsRegistration>,
    listeners: BTreeMap<ServiceEventKind, Vec<EventListener>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("plugins", &self.plugins)
            .field("service_types", &self.service_types.keys().collect::<Vec<_>>())
            .field("features", &self.features.keys().collect::<Vec<_>>())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("views", &self.views.keys().collect::<Vec<_>>())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Serializable summary of everything registered
#[derive(Debug, Serialize)]
pub struct Manifest<'a> {
    /// Booted plugin names
    pub plugins: &'a [String],
    /// Service types
    pub service_types: Vec<&'a ServiceTypeRegistration>,
    /// Features
    pub features: Vec<&'a FeatureRegistration>,
    /// Feature actions
    pub actions: Vec<&'a FeatureActionRegistration>,
    /// View namespaces
    pub views: Vec<&'a ViewsRegistration>,
    /// Event names with at least one listener
    pub events: Vec<&'static str>,
}

impl Registry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Boot `plugin` into this registry
    ///
    /// # Errors
    /// Propagates the plugin's registration errors
    pub fn boot(&mut self, plugin: &dyn Plugin) -> Result<(), PluginError> {
        plugin.boot(self)?;
        self.plugins.push(plugin.name().to_string());
        tracing::info!(plugin = plugin.name(), "plugin registered");
        Ok(())
    }

    /// Service type by id
    ///
    /// # Errors
    /// [`PluginError::UnknownService`] if absent
    pub fn service_type(&self, id: &str) -> Result<&ServiceTypeRegistration, PluginError> {
        self.service_types
            .get(id)
            .ok_or_else(|| PluginError::UnknownService(id.to_string()))
    }

    /// Feature by id
    #[must_use]
    pub fn feature(&self, id: &str) -> Option<&FeatureRegistration> {
        self.features.get(id)
    }

    /// Action by feature and key
    ///
    /// # Errors
    /// [`PluginError::UnknownAction`] if absent
    pub fn action(
        &self,
        feature: &str,
        action: &str,
    ) -> Result<&FeatureActionRegistration, PluginError> {
        self.actions
            .get(&(feature.to_string(), action.to_string()))
            .ok_or_else(|| PluginError::UnknownAction {
                feature: feature.to_string(),
                action: action.to_string(),
            })
    }

    /// Views by namespace
    #[must_use]
    pub fn views(&self, namespace: &str) -> Option<&ViewsRegistration> {
        self.views.get(namespace)
    }

    /// Run an action with posted `input`
    ///
    /// # Errors
    /// [`PluginError::UnknownAction`], [`PluginError::Inactive`], or the
    /// handler's own error
    pub async fn run_action(
        &self,
        feature: &str,
        action: &str,
        input: &BTreeMap<String, String>,
    ) -> Result<ActionOutcome, PluginError> {
        let registration = self.action(feature, action)?;
        let handler = registration.handler();
        if !handler.active() {
            return Err(PluginError::Inactive(registration.label.clone()));
        }
        tracing::info!(feature, action, "running action");
        handler.handle(input).await
    }

    /// Deliver `event` to its listeners, returning how many ran
    pub fn dispatch(&self, event: &ServiceEvent) -> usize {
        let listeners = self.listeners.get(&event.kind).map_or(&[][..], Vec::as_slice);
        for listener in listeners {
            listener(event);
        }
        tracing::debug!(event = %event.kind, service = %event.service.id, listeners = listeners.len(), "event dispatched");
        listeners.len()
    }

    /// Listeners across all kinds
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    /// Snapshot for display
    #[must_use]
    pub fn manifest(&self) -> Manifest<'_> {
        Manifest {
            plugins: &self.plugins,
            service_types: self.service_types.values().collect(),
            features: self.features.values().collect(),
            actions: self.actions.values().collect(),
            views: self.views.values().collect(),
            events: self
                .listeners
                .iter()
                .filter(|(_, l)| !l.is_empty())
                .map(|(kind, _)| kind.as_str())
                .collect(),
        }
    }
}

fn duplicate(kind: &'static str, key: impl Into<String>) -> PluginError {
    PluginError::Duplicate {
        kind,
        key: key.into(),
    }
}

impl PluginHost for Registry {
    fn register_service_type(
        &mut self,
        registration: ServiceTypeRegistration,
    ) -> Result<(), PluginError> {
        if self.service_types.contains_key(&registration.id) {
            return Err(duplicate("service type", registration.id));
        }
        self.service_types.insert(registration.id.clone(), registration);
        Ok(())
    }

    fn register_feature(&mut self, registration: FeatureRegistration) -> Result<(), PluginError> {
        if self.features.contains_key(&registration.id) {
            return Err(duplicate("feature", registration.id));
        }
        self.features.insert(registration.id.clone(), registration);
        Ok(())
    }

    fn register_feature_action(
        &mut self,
        registration: FeatureActionRegistration,
    ) -> Result<(), PluginError> {
        if !self.features.contains_key(&registration.feature) {
            return Err(PluginError::UnknownFeature(registration.feature));
        }
        let key = (registration.feature.clone(), registration.action.clone());
        if self.actions.contains_key(&key) {
            return Err(duplicate("feature action", format!("{}/{}", key.0, key.1)));
        }
        self.actions.insert(key, registration);
        Ok(())
    }

    fn register_views(&mut self, registration: ViewsRegistration) -> Result<(), PluginError> {
        if self.views.contains_key(&registration.namespace) {
            return Err(duplicate("views", registration.namespace));
        }
        self.views.insert(registration.namespace.clone(), registration);
        Ok(())
    }

    fn listen(&mut self, kind: ServiceEventKind, listener: EventListener) {
        self.listeners.entry(kind).or_default().push(listener);
    }
}
