//! Core data models.
//!
//! A [`Template`] fixes the set of output fields; every
//! [`NormalizedDocument`] is created from one with all fields `null` and
//! never gains or loses a key afterwards.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// The ordered, closed set of target field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    fields: Vec<String>,
}

impl Template {
    /// Read the template file; only its top-level keys are kept.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read template: {}", path.display()))?;
        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse template: {}", path.display()))?;
        let Value::Object(map) = value else {
            bail!("template {} is not a JSON object", path.display());
        };
        Ok(Self::new(map.keys().cloned()))
    }

    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for field in fields {
            let field = field.into();
            if !out.contains(&field) {
                out.push(field);
            }
        }
        Self { fields: out }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// A fresh document with every field `null`.
    pub fn blank(&self) -> NormalizedDocument {
        NormalizedDocument {
            fields: self
                .fields
                .iter()
                .map(|f| (f.clone(), Value::Null))
                .collect(),
        }
    }
}

/// The fixed-schema output record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedDocument {
    fields: Map<String, Value>,
}

impl NormalizedDocument {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// String value of a field, if it holds one.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// True when the field exists and holds `null`.
    pub fn is_null(&self, field: &str) -> bool {
        matches!(self.fields.get(field), Some(Value::Null))
    }

    /// True when the field is `null` or an empty string, array, or object.
    pub fn is_unset(&self, field: &str) -> bool {
        match self.fields.get(field) {
            Some(value) => is_empty_value(value),
            None => false,
        }
    }

    /// Assign a field. Unknown fields are refused and `false` is returned,
    /// so the key set never changes.
    pub fn set(&mut self, field: &str, value: Value) -> bool {
        match self.fields.get_mut(field) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_blank_document_all_null() {
        let t = Template::new(["project_name", "archived_path"]);
        let doc = t.blank();
        assert_eq!(doc.fields().len(), 2);
        assert!(doc.is_null("project_name"));
        assert!(doc.is_null("archived_path"));
    }

    #[test]
    fn test_set_refuses_unknown_fields() {
        let t = Template::new(["a"]);
        let mut doc = t.blank();
        assert!(doc.set("a", json!(1)));
        assert!(!doc.set("b", json!(2)));
        assert_eq!(doc.fields().len(), 1);
        assert_eq!(doc.get("a"), Some(&json!(1)));
    }

    #[test]
    fn test_is_unset() {
        let t = Template::new(["a", "b", "c", "d", "e"]);
        let mut doc = t.blank();
        doc.set("b", json!(""));
        doc.set("c", json!(0));
        doc.set("d", json!(false));
        doc.set("e", json!({}));
        assert!(doc.is_unset("a"));
        assert!(doc.is_unset("b"));
        assert!(!doc.is_unset("c"));
        assert!(!doc.is_unset("d"));
        assert!(doc.is_unset("e"));
        assert!(!doc.is_unset("missing"));
    }

    #[test]
    fn test_template_load_keeps_key_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("template.json");
        std::fs::write(&path, r#"{"zeta": 1, "alpha": "x", "mid": null}"#).unwrap();
        let t = Template::load(&path).unwrap();
        assert_eq!(t.fields(), &["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_template_load_rejects_non_object() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("template.json");
        std::fs::write(&path, "[]").unwrap();
        assert!(Template::load(&path).is_err());
    }

    #[test]
    fn test_serializes_as_flat_object() {
        let t = Template::new(["a", "b"]);
        let mut doc = t.blank();
        doc.set("a", json!("x"));
        assert_eq!(serde_json::to_value(&doc).unwrap(), json!({"a": "x", "b": null}));
    }
}
