//! Service lifecycle events
//!
//! Raised after a service is installed or removed and delivered to the
//! listeners a plugin registered for that kind.

use serde::Serialize;
use std::fmt;

/// Kind of lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ServiceEventKind {
    /// Service packages were installed
    #[serde(rename = "service.installed")]
    Installed,
    /// Service packages were removed
    #[serde(rename = "service.uninstalled")]
    Uninstalled,
}

impl ServiceEventKind {
    /// Wire name, e.g. `service.installed`
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installed => "service.installed",
            Self::Uninstalled => "service.uninstalled",
        }
    }
}

impl fmt::Display for ServiceEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The service an event is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRecord {
    /// Service id, e.g. `memcached`
    pub id: String,
    /// Service type, e.g. `memory_database`
    pub service_type: String,
    /// Human-readable name
    pub name: String,
}

impl ServiceRecord {
    /// Create a record
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        service_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            service_type: service_type.into(),
            name: name.into(),
        }
    }
}

/// A lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceEvent {
    /// What happened
    pub kind: ServiceEventKind,
    /// To which service
    pub service: ServiceRecord,
}

impl ServiceEvent {
    /// `service.installed` for `service`
    #[inline]
    #[must_use]
    pub fn installed(service: ServiceRecord) -> Self {
        Self {
            kind: ServiceEventKind::Installed,
            service,
        }
    }

    /// `service.uninstalled` for `service`
    #[inline]
    #[must_use]
    pub fn uninstalled(service: ServiceRecord) -> Self {
        Self {
            kind: ServiceEventKind::Uninstalled,
            service,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(ServiceEventKind::Installed.as_str(), "service.installed");
        assert_eq!(ServiceEventKind::Uninstalled.to_string(), "service.uninstalled");
        assert_eq!(
            serde_json::to_string(&ServiceEventKind::Installed).unwrap(),
            "\"service.installed\""
        );
    }

    #[test]
    fn constructors() {
        let record = ServiceRecord::new("memcached", "memory_database", "Memcached");
        let event = ServiceEvent::uninstalled(record.clone());
        assert_eq!(event.kind, ServiceEventKind::Uninstalled);
        assert_eq!(event.service, record);
    }
}
