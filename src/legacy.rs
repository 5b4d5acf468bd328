//! Legacy metadata documents and field lookup.
//!
//! A [`LegacyDocument`] is one JSON file loaded from an archive directory
//! with its top-level keys normalized by [`normalize_key`]. Values are read
//! through a [`FieldLookup`], which understands the two reference shapes a
//! mapping rule may use:
//!
//! | Reference | Meaning |
//! |-----------|---------|
//! | `project_name` | top-level key |
//! | `sample > owner_id` | key `owner_id` inside the object at `sample` |
//!
//! Only one level of nesting exists. Nested objects have their keys
//! normalized lazily, once per parent, and the cache lives inside the
//! lookup so it can never outlive the document it was built from.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};

use crate::keys::{normalize_key, normalize_keys};

/// Separator between parent and child in a nested reference.
pub const NESTING_DELIMITER: char = '>';

/// A parsed source-field reference from a mapping rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRef {
    Key(String),
    Nested { parent: String, child: String },
}

impl FieldRef {
    /// Parse `"key"` or `"parent > child"`.
    ///
    /// Both parts are trimmed and normalized. References with more than one
    /// delimiter or an empty part are rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split(NESTING_DELIMITER).map(str::trim).collect();
        match parts.as_slice() {
            [key] if !key.is_empty() => Ok(FieldRef::Key(normalize_key(key))),
            [parent, child] if !parent.is_empty() && !child.is_empty() => Ok(FieldRef::Nested {
                parent: normalize_key(parent),
                child: normalize_key(child),
            }),
            [_, _] | [_] => bail!("empty field reference part in '{}'", raw),
            _ => bail!(
                "field reference '{}' nests more than one level (only 'parent > child' is supported)",
                raw
            ),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRef::Key(key) => write!(f, "{key}"),
            FieldRef::Nested { parent, child } => write!(f, "{parent} > {child}"),
        }
    }
}

/// One legacy JSON file with normalized top-level keys.
#[derive(Debug, Clone)]
pub struct LegacyDocument {
    path: PathBuf,
    fields: Map<String, Value>,
}

impl LegacyDocument {
    /// Load `filename` from `dir`.
    ///
    /// Returns `Ok(None)` when the file does not exist, which is the common
    /// case: most directories carry only some of the legacy document types.
    pub fn load(dir: &Path, filename: &str) -> Result<Option<Self>> {
        let path = dir.join(filename);
        if !path.is_file() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse JSON in {}", path.display()))?;
        Self::from_value(path, value).map(Some)
    }

    /// Wrap an already-parsed JSON value. The top level must be an object.
    pub fn from_value(path: impl Into<PathBuf>, value: Value) -> Result<Self> {
        let path = path.into();
        let Value::Object(map) = value else {
            bail!("{} is not a JSON object", path.display());
        };
        Ok(Self {
            path,
            fields: normalize_keys(&map),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Direct top-level lookup. JSON `null` reads as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// The whole document (normalized top level) as a JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Start a lookup session over this document.
    pub fn lookup(&self) -> FieldLookup<'_> {
        FieldLookup {
            doc: self,
            nested: HashMap::new(),
        }
    }
}

/// Resolves [`FieldRef`]s against one document.
///
/// Normalized nested objects are memoized per parent key for the lifetime
/// of the lookup.
pub struct FieldLookup<'a> {
    doc: &'a LegacyDocument,
    nested: HashMap<String, Option<Map<String, Value>>>,
}

impl FieldLookup<'_> {
    pub fn resolve(&mut self, field_ref: &FieldRef) -> Option<Value> {
        match field_ref {
            FieldRef::Key(key) => self.doc.get(key).cloned(),
            FieldRef::Nested { parent, child } => self.get_nested(parent, child),
        }
    }

    pub fn get_nested(&mut self, parent: &str, child: &str) -> Option<Value> {
        let doc = self.doc;
        let sub = self.nested.entry(parent.to_string()).or_insert_with(|| {
            match doc.get(parent) {
                Some(Value::Object(map)) => Some(normalize_keys(map)),
                _ => None,
            }
        });
        sub.as_ref()?
            .get(child)
            .filter(|v| !v.is_null())
            .cloned()
    }
}
