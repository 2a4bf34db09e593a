//! Form schema for feature actions
//!
//! A host renders these as input forms and posts the values back as a
//! string map.

use serde::Serialize;

/// Input widget type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Single-line text
    #[default]
    Text,
}

/// One form field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DynamicField {
    /// Key in the posted map
    pub name: String,
    /// Label shown to the user
    pub label: String,
    /// Help text shown under the input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Widget type
    pub kind: FieldKind,
    /// Pre-filled value
    pub default: Option<String>,
    /// Whether the field must be non-blank
    pub required: bool,
}

impl DynamicField {
    /// Optional text field
    #[must_use]
    pub fn text(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            description: None,
            kind: FieldKind::Text,
            default: None,
            required: false,
        }
    }

    /// Set the help text
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the pre-filled value
    #[inline]
    #[must_use]
    pub fn with_default(mut self, value: impl ToString) -> Self {
        self.default = Some(value.to_string());
        self
    }

    /// Mark as required
    #[inline]
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Ordered set of fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DynamicForm {
    fields: Vec<DynamicField>,
}

impl DynamicForm {
    /// Empty form
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field
    #[inline]
    #[must_use]
    pub fn field(mut self, field: DynamicField) -> Self {
        self.fields.push(field);
        self
    }

    /// Fields in display order
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[DynamicField] {
        &self.fields
    }

    /// Field by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DynamicField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder() {
        let form = DynamicForm::new()
            .field(
                DynamicField::text("port", "Port")
                    .with_description("TCP port")
                    .with_default(11211)
                    .required(),
            )
            .field(DynamicField::text("note", "Note"));

        assert_eq!(form.fields().len(), 2);
        let port = form.get("port").unwrap();
        assert_eq!(port.default.as_deref(), Some("11211"));
        assert_eq!(port.description.as_deref(), Some("TCP port"));
        assert!(port.required);
        assert!(!form.get("note").unwrap().required);
        assert!(form.get("missing").is_none());
    }

    #[test]
    fn serializes_kind_lowercase() {
        let json = serde_json::to_value(DynamicField::text("a", "A")).unwrap();
        assert_eq!(json["kind"], "text");
        assert_eq!(json["default"], serde_json::Value::Null);
        assert!(json.get("description").is_none());
    }
}
