//! Group and owner lookup.
//!
//! Legacy documents name owners in many ways (a lab group, a manager's user
//! id, a user id). The mapper hands identifier fields to a [`GroupLookup`]
//! to obtain the canonical value, and asks it which system groups a legacy
//! document belongs to.
//!
//! [`GroupDirectory`] is the file-backed implementation:
//!
//! ```json
//! {
//!   "groups": [
//!     { "name": "lab_x", "manager_user_id": "jdoe" }
//!   ]
//! }
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::Config;
use crate::legacy::LegacyDocument;

pub trait GroupLookup: Send + Sync {
    /// Resolve `raw` for the identifier field `field_key`.
    ///
    /// `None` means the identifier is unknown.
    fn resolve_identity(&self, field_key: &str, raw: &Value) -> Option<Value>;

    /// System groups referenced anywhere in a legacy document, if any.
    fn groups_for_document(&self, doc: &LegacyDocument) -> Option<Vec<String>>;
}

/// Lookup used when no group directory is configured: identifiers pass
/// through unchanged and no groups are reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughLookup;

impl GroupLookup for PassthroughLookup {
    fn resolve_identity(&self, _field_key: &str, raw: &Value) -> Option<Value> {
        Some(raw.clone())
    }

    fn groups_for_document(&self, _doc: &LegacyDocument) -> Option<Vec<String>> {
        None
    }
}

/// The configured lookup: a [`GroupDirectory`] when `[groups]` is set,
/// otherwise [`PassthroughLookup`].
pub fn lookup_from_config(config: &Config) -> Result<Box<dyn GroupLookup>> {
    match &config.groups {
        Some(groups) => {
            let directory = GroupDirectory::load(&config.resolve_path(&groups.directory))?;
            tracing::debug!("Loaded {} groups", directory.groups.len());
            Ok(Box::new(directory))
        }
        None => Ok(Box::new(PassthroughLookup)),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupRecord {
    pub name: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupDirectory {
    #[serde(default)]
    groups: Vec<GroupRecord>,
}

impl GroupDirectory {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read group directory: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse group directory: {}", path.display()))
    }
}

impl GroupLookup for GroupDirectory {
    /// A record matches when its name or its `field_key` attribute equals
    /// `raw`; the record's `field_key` attribute is returned.
    fn resolve_identity(&self, field_key: &str, raw: &Value) -> Option<Value> {
        let needle = match raw {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        self.groups
            .iter()
            .find(|g| {
                g.name == needle
                    || g.attributes.get(field_key).and_then(Value::as_str) == Some(needle.as_str())
            })
            .and_then(|g| g.attributes.get(field_key).cloned())
    }

    fn groups_for_document(&self, doc: &LegacyDocument) -> Option<Vec<String>> {
        let mut strings = BTreeSet::new();
        for value in doc.fields().values() {
            collect_strings(value, &mut strings);
        }
        let found: Vec<String> = self
            .groups
            .iter()
            .filter(|g| strings.contains(g.name.as_str()))
            .map(|g| g.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if found.is_empty() {
            None
        } else {
            Some(found)
        }
    }
}

fn collect_strings<'a>(value: &'a Value, out: &mut BTreeSet<&'a str>) {
    match value {
        Value::String(s) => {
            out.insert(s.as_str());
        }
        Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}
