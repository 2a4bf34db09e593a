//! Tune action
//!
//! Validates the posted form, then rewrites the `-m`, `-p` and `-l` lines of
//! the memcached config and restarts the unit once.

use crate::config::MemcachedConfig;
use crate::error::PluginError;
use crate::form::{DynamicField, DynamicForm};
use crate::plugin::{ActionHandler, ActionOutcome};
use async_trait::async_trait;
use mcd_exec::CommandExecutor;
use mcd_flags::{ApplyReport, FlagAssignment, FlagUpdater, ReloadTrigger};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Action name shown to users
pub const ACTION_LABEL: &str = "Apply Tuning";

/// Allowed cache size in MB
pub const MEMORY_RANGE: RangeInclusive<i64> = 16..=262_144;

/// Allowed TCP port
pub const PORT_RANGE: RangeInclusive<i64> = 1..=65_535;

/// Longest accepted listen address
pub const LISTEN_MAX_LEN: usize = 255;

/// Pre-filled cache size in MB
pub const DEFAULT_MEMORY_MB: u32 = 64;
/// Pre-filled port, memcached's own default
pub const DEFAULT_PORT: u16 = 11_211;
/// Pre-filled listen address, loopback only
pub const DEFAULT_LISTEN: &str = "127.0.0.1";

const FIELD_MEMORY: &str = "memory_mb";
const FIELD_PORT: &str = "port";
const FIELD_LISTEN: &str = "listen";

/// Field-keyed validation messages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    /// Record a message against `field`
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// No messages recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Messages for one field
    #[must_use]
    pub fn field(&self, name: &str) -> &[String] {
        self.fields.get(name).map_or(&[], Vec::as_slice)
    }

    /// All failing field names
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field} {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Validated tuning values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuneRequest {
    memory_mb: u32,
    port: u16,
    listen: String,
}

impl Default for TuneRequest {
    fn default() -> Self {
        Self {
            memory_mb: DEFAULT_MEMORY_MB,
            port: DEFAULT_PORT,
            listen: DEFAULT_LISTEN.to_string(),
        }
    }
}

impl TuneRequest {
    /// Validate typed values
    ///
    /// # Errors
    /// Returns every violated rule, keyed by field
    pub fn new(memory_mb: u32, port: u16, listen: &str) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        check_range(&mut errors, FIELD_MEMORY, i64::from(memory_mb), &MEMORY_RANGE);
        check_range(&mut errors, FIELD_PORT, i64::from(port), &PORT_RANGE);
        check_listen(&mut errors, listen);
        errors.into_result(Self {
            memory_mb,
            port,
            listen: listen.to_string(),
        })
    }

    /// Parse and validate a posted form
    ///
    /// # Errors
    /// Returns every missing, malformed or out-of-range field
    pub fn from_form(input: &BTreeMap<String, String>) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let memory = parse_int(&mut errors, input, FIELD_MEMORY, &MEMORY_RANGE);
        let port = parse_int(&mut errors, input, FIELD_PORT, &PORT_RANGE);
        let listen = required(&mut errors, input, FIELD_LISTEN);
        if let Some(listen) = listen {
            check_listen(&mut errors, listen);
        }

        match (memory, port, listen) {
            (Some(memory), Some(port), Some(listen)) if errors.is_empty() => Ok(Self {
                memory_mb: u32::try_from(memory).unwrap_or(DEFAULT_MEMORY_MB),
                port: u16::try_from(port).unwrap_or(DEFAULT_PORT),
                listen: listen.to_string(),
            }),
            _ => Err(errors),
        }
    }

    /// Cache size in MB
    #[inline]
    #[must_use]
    pub fn memory_mb(&self) -> u32 {
        self.memory_mb
    }

    /// TCP port
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Listen address
    #[inline]
    #[must_use]
    pub fn listen(&self) -> &str {
        &self.listen
    }

    /// `-m`, `-p`, `-l` in that order
    #[must_use]
    pub fn assignments(&self) -> Vec<FlagAssignment> {
        vec![
            FlagAssignment::new("-m", self.memory_mb),
            FlagAssignment::new("-p", self.port),
            FlagAssignment::new("-l", &self.listen),
        ]
    }

    /// Message returned after a successful apply
    #[must_use]
    pub fn success_message(&self) -> String {
        format!(
            "Memcached tuning applied: memory={}MB, port={}, listen={}",
            self.memory_mb, self.port, self.listen
        )
    }

    /// Values as a posted form would carry them
    #[must_use]
    pub fn to_form(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (FIELD_MEMORY.to_string(), self.memory_mb.to_string()),
            (FIELD_PORT.to_string(), self.port.to_string()),
            (FIELD_LISTEN.to_string(), self.listen.clone()),
        ])
    }
}

fn required<'a>(
    errors: &mut ValidationErrors,
    input: &'a BTreeMap<String, String>,
    field: &str,
) -> Option<&'a str> {
    match input.get(field).map(|v| v.trim()) {
        Some(value) if !value.is_empty() => Some(value),
        _ => {
            errors.add(field, "is required");
            None
        }
    }
}

fn parse_int(
    errors: &mut ValidationErrors,
    input: &BTreeMap<String, String>,
    field: &str,
    range: &RangeInclusive<i64>,
) -> Option<i64> {
    let raw = required(errors, input, field)?;
    let Ok(value) = raw.parse::<i64>() else {
        errors.add(field, "must be an integer");
        return None;
    };
    check_range(errors, field, value, range).then_some(value)
}

fn check_range(
    errors: &mut ValidationErrors,
    field: &str,
    value: i64,
    range: &RangeInclusive<i64>,
) -> bool {
    if range.contains(&value) {
        return true;
    }
    errors.add(
        field,
        format!("must be between {} and {}", range.start(), range.end()),
    );
    false
}

fn check_listen(errors: &mut ValidationErrors, listen: &str) {
    if listen.is_empty() {
        errors.add(FIELD_LISTEN, "is required");
        return;
    }
    if listen.chars().count() > LISTEN_MAX_LEN {
        errors.add(
            FIELD_LISTEN,
            format!("must be at most {LISTEN_MAX_LEN} characters"),
        );
    }
    // the value is written as the remainder of a single config line
    if listen.chars().any(|c| c.is_whitespace() || c.is_control()) {
        errors.add(FIELD_LISTEN, "must not contain whitespace or control characters");
    }
}

/// The form presented for tuning
#[must_use]
pub fn tune_form() -> DynamicForm {
    DynamicForm::new()
        .field(
            DynamicField::text(FIELD_MEMORY, "Memory (MB)")
                .with_description("Total memory to allocate to memcached (e.g., 64, 256, 1024)")
                .with_default(DEFAULT_MEMORY_MB)
                .required(),
        )
        .field(
            DynamicField::text(FIELD_PORT, "Port")
                .with_description("TCP port memcached will listen on")
                .with_default(DEFAULT_PORT)
                .required(),
        )
        .field(
            DynamicField::text(FIELD_LISTEN, "Listen Address")
                .with_description("Bind address (e.g., 127.0.0.1 or 0.0.0.0)")
                .with_default(DEFAULT_LISTEN)
                .required(),
        )
}

/// Applies [`TuneRequest`]s to one host
#[derive(Clone)]
pub struct Tune {
    exec: Arc<dyn CommandExecutor>,
    settings: MemcachedConfig,
}

impl fmt::Debug for Tune {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tune")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Tune {
    /// Tune action for the host behind `exec`
    #[must_use]
    pub fn new(exec: Arc<dyn CommandExecutor>, settings: MemcachedConfig) -> Self {
        Self { exec, settings }
    }

    fn updater(&self) -> FlagUpdater {
        FlagUpdater::new(self.settings.config_path.clone())
            .with_sudo(self.settings.use_sudo)
            .with_label_prefix("memcached-tune")
    }

    fn reload(&self) -> ReloadTrigger {
        ReloadTrigger::systemctl_restart(&self.settings.unit, self.settings.use_sudo)
    }

    /// Write the three flags and restart once
    ///
    /// # Errors
    /// Returns [`PluginError::Update`] naming the failing flag and step
    pub async fn apply(&self, request: &TuneRequest) -> Result<ApplyReport, PluginError> {
        let report = self
            .updater()
            .apply(&request.assignments(), &self.reload(), self.exec.as_ref())
            .await?;
        tracing::info!(
            memory_mb = request.memory_mb,
            port = request.port,
            listen = %request.listen,
            changed = report.changed(),
            "memcached tuning applied"
        );
        Ok(report)
    }
}

#[async_trait]
impl ActionHandler for Tune {
    fn name(&self) -> &str {
        ACTION_LABEL
    }

    fn form(&self) -> DynamicForm {
        tune_form()
    }

    async fn handle(&self, input: &BTreeMap<String, String>) -> Result<ActionOutcome, PluginError> {
        let request = TuneRequest::from_form(input)?;
        let report = self.apply(&request).await?;
        Ok(ActionOutcome {
            message: request.success_message(),
            report: Some(report),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn form(memory: &str, port: &str, listen: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("memory_mb".to_string(), memory.to_string()),
            ("port".to_string(), port.to_string()),
            ("listen".to_string(), listen.to_string()),
        ])
    }

    #[test]
    fn valid_form() {
        let request = TuneRequest::from_form(&form("256", "11211", "0.0.0.0")).unwrap();
        assert_eq!(request.memory_mb(), 256);
        assert_eq!(request.port(), 11211);
        assert_eq!(request.listen(), "0.0.0.0");
        assert_eq!(
            request.success_message(),
            "Memcached tuning applied: memory=256MB, port=11211, listen=0.0.0.0"
        );
    }

    #[test]
    fn surrounding_blanks_are_trimmed() {
        let request = TuneRequest::from_form(&form(" 64 ", "11211", " 10.0.0.1 ")).unwrap();
        assert_eq!(request.memory_mb(), 64);
        assert_eq!(request.listen(), "10.0.0.1");
    }

    #[test]
    fn every_violation_is_reported() {
        let errors = TuneRequest::from_form(&form("8", "70000", "0.0.0.0 -vv")).unwrap_err();
        assert_eq!(errors.field_names().collect::<Vec<_>>(), ["listen", "memory_mb", "port"]);
        assert_eq!(errors.field("memory_mb"), ["must be between 16 and 262144"]);
        assert_eq!(errors.field("port"), ["must be between 1 and 65535"]);
    }

    #[test]
    fn missing_and_blank_fields_are_required() {
        let mut input = form("", "11211", "x");
        input.remove("listen");
        let errors = TuneRequest::from_form(&input).unwrap_err();
        assert_eq!(errors.field("memory_mb"), ["is required"]);
        assert_eq!(errors.field("listen"), ["is required"]);
        assert!(errors.field("port").is_empty());
    }

    #[test]
    fn non_numeric_rejected() {
        let errors = TuneRequest::from_form(&form("lots", "11211", "::1")).unwrap_err();
        assert_eq!(errors.field("memory_mb"), ["must be an integer"]);
    }

    #[test]
    fn overlong_listen_rejected() {
        let long = "a".repeat(LISTEN_MAX_LEN + 1);
        let errors = TuneRequest::new(64, 11211, &long).unwrap_err();
        assert_eq!(errors.field("listen"), ["must be at most 255 characters"]);
        assert!(TuneRequest::new(64, 11211, &long[1..]).is_ok());
    }

    #[test]
    fn port_zero_rejected() {
        let errors = TuneRequest::new(64, 0, "127.0.0.1").unwrap_err();
        assert!(errors.to_string().starts_with("port must be between"));
    }

    #[test]
    fn assignments_order() {
        let lines: Vec<String> = TuneRequest::default()
            .assignments()
            .iter()
            .map(FlagAssignment::line)
            .collect();
        assert_eq!(lines, ["-m 64", "-p 11211", "-l 127.0.0.1"]);
    }

    #[test]
    fn form_defaults() {
        let form = tune_form();
        let labels: Vec<&str> = form.fields().iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, ["Memory (MB)", "Port", "Listen Address"]);
        assert!(form.fields().iter().all(|f| f.required));
        assert!(form.fields().iter().all(|f| f.description.is_some()));
        assert_eq!(
            form.get("memory_mb").and_then(|f| f.description.as_deref()),
            Some("Total memory to allocate to memcached (e.g., 64, 256, 1024)")
        );
        assert_eq!(
            TuneRequest::from_form(&TuneRequest::default().to_form()).unwrap(),
            TuneRequest::default()
        );
    }

    proptest! {
        #[test]
        fn in_range_values_validate(memory in 16u32..=262_144, port in 1u16..) {
            let input = form(&memory.to_string(), &port.to_string(), "127.0.0.1");
            let request = TuneRequest::from_form(&input).unwrap();
            prop_assert_eq!(request.memory_mb(), memory);
            prop_assert_eq!(request.port(), port);
        }

        #[test]
        fn small_memory_rejected(memory in 0u32..16) {
            let errors = TuneRequest::new(memory, 11211, "127.0.0.1").unwrap_err();
            prop_assert_eq!(errors.field_names().collect::<Vec<_>>(), vec!["memory_mb"]);
        }
    }
}
