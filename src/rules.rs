//! Field-mapping rules and default values.
//!
//! Mapping sections are keyed `<category>_<doctag>` and list, in order,
//! which source reference fills which target field. The reserved catch-all
//! field inside a section is a flag, not a mapping: when it is `"true"` the
//! whole legacy document is embedded under that field.
//!
//! Defaults are `"type:value"` literals parsed once into [`DefaultValue`].

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use tracing::warn;

use crate::config::Config;
use crate::legacy::FieldRef;
use crate::models::Template;

/// One target-field ← source-reference mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    pub target: String,
    pub source: FieldRef,
}

/// The rules for one (category, legacy document type) pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingSection {
    pub mappings: Vec<FieldMapping>,
    pub catch_all: bool,
}

/// A typed default literal.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Dict(Map<String, Value>),
    Null,
}

impl DefaultValue {
    /// Parse `"int:0"`, `"str:None"`, `"bool:true"`, `"dict:"`, `"null:"`.
    ///
    /// Only the first `:` separates type from value, so string defaults may
    /// contain colons. A non-empty `dict` value must be a JSON object.
    pub fn parse(packed: &str) -> Result<Self> {
        let Some((kind, val)) = packed.split_once(':') else {
            bail!("default '{}' is not of the form type:value", packed);
        };
        let parsed = match kind.trim().to_ascii_lowercase().as_str() {
            "int" => DefaultValue::Int(
                val.trim()
                    .parse()
                    .with_context(|| format!("invalid int default '{}'", val))?,
            ),
            "float" => DefaultValue::Float(
                val.trim()
                    .parse()
                    .with_context(|| format!("invalid float default '{}'", val))?,
            ),
            "str" => DefaultValue::Str(val.to_string()),
            "bool" => DefaultValue::Bool(val.trim().eq_ignore_ascii_case("true")),
            "dict" => {
                if val.trim().is_empty() {
                    DefaultValue::Dict(Map::new())
                } else {
                    match serde_json::from_str(val.trim()) {
                        Ok(Value::Object(map)) => DefaultValue::Dict(map),
                        _ => bail!("dict default '{}' is not a JSON object", val),
                    }
                }
            }
            "null" | "none" => DefaultValue::Null,
            other => bail!("unknown default type '{}' in '{}'", other, packed),
        };
        Ok(parsed)
    }

    pub fn to_value(&self) -> Value {
        match self {
            DefaultValue::Int(i) => Value::from(*i),
            DefaultValue::Float(f) => Value::from(*f),
            DefaultValue::Str(s) => Value::String(s.clone()),
            DefaultValue::Bool(b) => Value::Bool(*b),
            DefaultValue::Dict(m) => Value::Object(m.clone()),
            DefaultValue::Null => Value::Null,
        }
    }
}

/// All mapping sections plus the default table.
#[derive(Debug, Clone, Default)]
pub struct MappingRules {
    sections: HashMap<String, MappingSection>,
    defaults: Vec<(String, DefaultValue)>,
}

impl MappingRules {
    /// Build rules from config, dropping entries that target fields the
    /// template does not define.
    pub fn from_config(config: &Config, template: &Template) -> Result<Self> {
        let catch_all = config.fields.catch_all.as_str();
        let mut sections = HashMap::new();

        for (tag, table) in &config.mappings {
            let Some(table) = table.as_table() else {
                bail!("mappings.{} must be a table", tag);
            };
            let mut section = MappingSection::default();
            for (target, source) in table {
                if target.eq_ignore_ascii_case(catch_all) {
                    section.catch_all = parse_flag(source)
                        .with_context(|| format!("mappings.{}.{}", tag, target))?;
                    continue;
                }
                let Some(source) = source.as_str() else {
                    bail!("mappings.{}.{} must be a string", tag, target);
                };
                if !template.contains(target) {
                    warn!("mappings.{}: target field '{}' is not in the template, ignoring", tag, target);
                    continue;
                }
                let source = FieldRef::parse(source)
                    .with_context(|| format!("mappings.{}.{}", tag, target))?;
                section.mappings.push(FieldMapping {
                    target: target.clone(),
                    source,
                });
            }
            sections.insert(tag.clone(), section);
        }

        let mut defaults = Vec::new();
        for (field, packed) in &config.defaults {
            let Some(packed) = packed.as_str() else {
                bail!("defaults.{} must be a \"type:value\" string", field);
            };
            let value = DefaultValue::parse(packed).with_context(|| format!("defaults.{}", field))?;
            if !template.contains(field) {
                warn!("defaults: field '{}' is not in the template, ignoring", field);
                continue;
            }
            defaults.push((field.clone(), value));
        }

        Ok(Self { sections, defaults })
    }

    /// Section for a category and legacy document tag, if one exists.
    pub fn section(&self, category: &str, doc_tag: &str) -> Option<&MappingSection> {
        self.sections.get(&section_tag(category, doc_tag))
    }

    pub fn defaults(&self) -> &[(String, DefaultValue)] {
        &self.defaults
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }
}

pub fn section_tag(category: &str, doc_tag: &str) -> String {
    format!("{}_{}", category, doc_tag)
}

/// Catch-all flags are the string `"true"` (any case) or a TOML boolean.
fn parse_flag(value: &toml::Value) -> Result<bool> {
    match value {
        toml::Value::Boolean(b) => Ok(*b),
        toml::Value::String(s) => Ok(s.trim().eq_ignore_ascii_case("true")),
        other => bail!("expected \"true\"/\"false\", got {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use serde_json::json;
    use std::path::Path;

    fn config(extra: &str) -> Config {
        parse_config(
            &format!("[archive]\ntemplate = \"t.json\"\n{extra}"),
            Path::new("."),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_defaults() {
        assert_eq!(DefaultValue::parse("int:0").unwrap(), DefaultValue::Int(0));
        assert_eq!(DefaultValue::parse("float:1.5").unwrap(), DefaultValue::Float(1.5));
        assert_eq!(DefaultValue::parse("str:None").unwrap(), DefaultValue::Str("None".into()));
        assert_eq!(DefaultValue::parse("str:a:b").unwrap(), DefaultValue::Str("a:b".into()));
        assert_eq!(DefaultValue::parse("bool:True").unwrap(), DefaultValue::Bool(true));
        assert_eq!(DefaultValue::parse("bool:no").unwrap(), DefaultValue::Bool(false));
        assert_eq!(DefaultValue::parse("dict:").unwrap(), DefaultValue::Dict(Map::new()));
        assert_eq!(DefaultValue::parse("null:").unwrap(), DefaultValue::Null);
        assert_eq!(
            DefaultValue::parse(r#"dict:{"k": 1}"#).unwrap().to_value(),
            json!({"k": 1})
        );
    }

    #[test]
    fn test_parse_defaults_rejects_bad_input() {
        assert!(DefaultValue::parse("int").is_err());
        assert!(DefaultValue::parse("int:abc").is_err());
        assert!(DefaultValue::parse("list:[]").is_err());
        assert!(DefaultValue::parse("dict:[1]").is_err());
    }

    #[test]
    fn test_from_config() {
        let cfg = config(
            r#"
[mappings.gt_info]
project_name = "ProjectName"
manager_user_id = "sample > owner_id"
not_in_template = "x"
user_metadata = "True"

[mappings.gt_archived]
archived_path = "path"

[defaults]
archival_status = "str:completed"
archived_size = "int:0"
unknown = "int:1"
"#,
        );
        let template = Template::new([
            "project_name",
            "manager_user_id",
            "user_metadata",
            "archived_path",
            "archival_status",
            "archived_size",
        ]);
        let rules = MappingRules::from_config(&cfg, &template).unwrap();
        assert_eq!(rules.section_count(), 2);

        let info = rules.section("gt", "info").unwrap();
        assert!(info.catch_all);
        assert_eq!(
            info.mappings,
            vec![
                FieldMapping {
                    target: "project_name".into(),
                    source: FieldRef::Key("project_name".into()),
                },
                FieldMapping {
                    target: "manager_user_id".into(),
                    source: FieldRef::Nested {
                        parent: "sample".into(),
                        child: "owner_id".into()
                    },
                },
            ]
        );

        let archived = rules.section("gt", "archived").unwrap();
        assert!(!archived.catch_all);
        assert!(rules.section("gt", "missing").is_none());
        assert!(rules.section("other", "info").is_none());

        let defaults: Vec<_> = rules.defaults().iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(defaults, vec!["archival_status", "archived_size"]);
    }

    #[test]
    fn test_from_config_rejects_non_string_source() {
        let cfg = config("[mappings.gt_info]\nproject_name = 3\n");
        let template = Template::new(["project_name"]);
        assert!(MappingRules::from_config(&cfg, &template).is_err());
    }

    #[test]
    fn test_from_config_rejects_deep_reference() {
        let cfg = config("[mappings.gt_info]\nproject_name = \"a > b > c\"\n");
        let template = Template::new(["project_name"]);
        assert!(MappingRules::from_config(&cfg, &template).is_err());
    }

    #[test]
    fn test_bool_catch_all_flag() {
        let cfg = config("[mappings.gt_info]\nuser_metadata = true\n");
        let template = Template::new(["user_metadata"]);
        let rules = MappingRules::from_config(&cfg, &template).unwrap();
        assert!(rules.section("gt", "info").unwrap().catch_all);
    }
}
