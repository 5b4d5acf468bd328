//! The document mapper.
//!
//! Turns one archive directory into one [`NormalizedDocument`]:
//!
//! 1. Classify the directory path. No category means no document.
//! 2. Start from the blank template.
//! 3. For each configured legacy document type, in order, load its file if
//!    present and apply the `<category>_<doctag>` mapping section:
//!    - a target that is still `null` is filled from the resolved source
//!      value (dates normalized, owner ids resolved through the group
//!      lookup);
//!    - a target that already holds a different non-null value is a
//!      conflict; the first value is kept;
//!    - a catch-all section embeds the whole legacy document.
//! 4. Fill the archive path and date from the directory itself when no
//!    legacy document supplied them.
//! 5. Back-fill configured defaults into fields that are still empty.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::classify::Classifier;
use crate::config::{Config, FieldsConfig, LegacyDocConfig};
use crate::dates::DateNormalizer;
use crate::error::MappingError;
use crate::groups::GroupLookup;
use crate::legacy::{FieldLookup, LegacyDocument};
use crate::models::{NormalizedDocument, Template};
use crate::rules::{MappingRules, MappingSection};

/// Result of mapping one directory.
#[derive(Debug, Clone)]
pub enum MapOutcome {
    /// No category rule matched, or the directory is excluded.
    Unclassified,
    Mapped(MappedDocument),
}

#[derive(Debug, Clone)]
pub struct MappedDocument {
    pub category: String,
    pub document: NormalizedDocument,
    /// Tags of the legacy document types that contributed.
    pub sources: Vec<String>,
    /// Non-fatal problems met while mapping.
    pub issues: Vec<MappingError>,
}

impl MappedDocument {
    pub fn conflicts(&self) -> impl Iterator<Item = &MappingError> {
        self.issues.iter().filter(|e| e.is_conflict())
    }
}

pub struct DocumentMapper {
    template: Template,
    classifier: Classifier,
    documents: Vec<LegacyDocConfig>,
    rules: MappingRules,
    dates: DateNormalizer,
    date_field: Regex,
    fields: FieldsConfig,
    archive_root: PathBuf,
    groups: Box<dyn GroupLookup>,
}

impl DocumentMapper {
    /// Build a mapper from loaded configuration. Reads the template file.
    pub fn from_config(config: &Config, groups: Box<dyn GroupLookup>) -> Result<Self> {
        let template = Template::load(&config.template_path())?;
        let rules = MappingRules::from_config(config, &template)?;
        Self::new(config, template, rules, groups)
    }

    /// Build a mapper with an explicit template and rule set.
    pub fn new(
        config: &Config,
        template: Template,
        rules: MappingRules,
        groups: Box<dyn GroupLookup>,
    ) -> Result<Self> {
        let classifier = Classifier::new(&config.categories.rules, &config.categories.exclude_patterns)?;
        let dates = DateNormalizer::new(&config.dates.format)?;
        let date_field = Regex::new(&format!("^(?:{})", config.dates.field_pattern))
            .with_context(|| format!("Invalid dates.field_pattern: '{}'", config.dates.field_pattern))?;

        Ok(Self {
            template,
            classifier,
            documents: config.documents.clone(),
            rules,
            dates,
            date_field,
            fields: config.fields.clone(),
            archive_root: config.archive.root.clone(),
            groups,
        })
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn dates(&self) -> &DateNormalizer {
        &self.dates
    }

    pub fn fields(&self) -> &FieldsConfig {
        &self.fields
    }

    pub fn classify(&self, dir: &Path) -> Option<&str> {
        self.classifier.classify(&dir.to_string_lossy())
    }

    /// Map one archive directory.
    pub fn create_document(&self, dir: &Path) -> Result<MapOutcome> {
        let dir_str = dir.to_string_lossy().to_string();
        let Some(category) = self.classify(dir) else {
            return Ok(MapOutcome::Unclassified);
        };

        let mut doc = self.template.blank();
        let mut sources = Vec::new();
        let mut issues = Vec::new();

        for legacy_type in &self.documents {
            let legacy = match LegacyDocument::load(dir, &legacy_type.filename) {
                Ok(Some(legacy)) => legacy,
                Ok(None) => continue,
                Err(e) => {
                    let issue = MappingError::UnreadableDocument {
                        path: dir.join(&legacy_type.filename).display().to_string(),
                        reason: format!("{e:#}"),
                    };
                    error!("{}", issue);
                    issues.push(issue);
                    continue;
                }
            };

            if legacy.fields().is_empty() {
                debug!("Ignoring empty {}", legacy.path().display());
                continue;
            }

            let Some(section) = self.rules.section(category, &legacy_type.tag) else {
                debug!(
                    "No mapping section {}_{} for {}",
                    category, legacy_type.tag, dir_str
                );
                continue;
            };

            self.apply_section(&mut doc, section, &legacy, &dir_str, &mut issues);

            if section.catch_all {
                doc.set(&self.fields.catch_all, legacy.to_value());
            }

            if let Some(groups) = self.groups.groups_for_document(&legacy) {
                doc.set(&self.fields.system_groups, Value::from(groups));
            }

            sources.push(legacy_type.tag.clone());
        }

        self.add_archive_path(&mut doc, dir);
        self.add_date(&mut doc, dir)?;
        self.add_defaults(&mut doc);

        Ok(MapOutcome::Mapped(MappedDocument {
            category: category.to_string(),
            document: doc,
            sources,
            issues,
        }))
    }

    fn apply_section(
        &self,
        doc: &mut NormalizedDocument,
        section: &MappingSection,
        legacy: &LegacyDocument,
        dir: &str,
        issues: &mut Vec<MappingError>,
    ) {
        // Nested-object cache lives only as long as this document's pass.
        let mut lookup: FieldLookup<'_> = legacy.lookup();

        for mapping in &section.mappings {
            let target = mapping.target.as_str();
            if target == self.fields.catch_all {
                continue;
            }
            let Some(raw) = lookup.resolve(&mapping.source) else {
                continue;
            };

            let filled = !doc.is_null(target);
            let candidate = match self.transform(target, raw, filled, dir) {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(issue) => {
                    error!("{}", issue);
                    issues.push(issue);
                    continue;
                }
            };

            match doc.get(target) {
                Some(Value::Null) => {
                    doc.set(target, candidate);
                }
                Some(existing) if *existing != candidate => {
                    let issue = MappingError::FieldConflict {
                        dir: dir.to_string(),
                        field: target.to_string(),
                        existing: existing.clone(),
                        incoming: candidate,
                    };
                    error!("{}", issue);
                    issues.push(issue);
                }
                _ => {}
            }
        }
    }

    /// Value that would be stored for `target`: dates normalized, owner
    /// identifiers resolved. `Ok(None)` leaves the field untouched.
    ///
    /// An identifier the lookup does not know is skipped while the field is
    /// empty; once the field holds a value the raw identifier is returned so
    /// a disagreement still surfaces as a conflict.
    fn transform(
        &self,
        target: &str,
        raw: Value,
        filled: bool,
        dir: &str,
    ) -> Result<Option<Value>, MappingError> {
        let mut value = raw;

        if self.date_field.is_match(target) {
            let text = match &value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            match self.dates.normalize(&text) {
                Ok(date) => value = Value::String(date),
                Err(_) => {
                    return Err(MappingError::InvalidDate {
                        dir: dir.to_string(),
                        field: target.to_string(),
                        raw: text,
                    })
                }
            }
        }

        if target == self.fields.manager_user_id || target == self.fields.user_id {
            match self
                .groups
                .resolve_identity(&self.fields.group_lookup_key, &value)
            {
                Some(resolved) => value = resolved,
                None if filled => return Ok(Some(value)),
                None => {
                    warn!(
                        "Could not resolve {} '{}' for {}",
                        target, value, dir
                    );
                    return Ok(None);
                }
            }
        }

        Ok(Some(value))
    }

    fn under_archive_root(&self, dir: &Path) -> bool {
        dir.starts_with(&self.archive_root) && dir.is_dir()
    }

    fn add_archive_path(&self, doc: &mut NormalizedDocument, dir: &Path) {
        let field = self.fields.archive_path.as_str();
        if !doc.is_unset(field) || !self.under_archive_root(dir) {
            return;
        }
        doc.set(field, Value::String(dir.display().to_string()));
    }

    fn add_date(&self, doc: &mut NormalizedDocument, dir: &Path) -> Result<()> {
        let field = self.fields.date.as_str();
        if !doc.is_unset(field) || !self.under_archive_root(dir) {
            return Ok(());
        }
        let mtime = std::fs::metadata(dir)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to read modification time of {}", dir.display()))?;
        doc.set(field, Value::String(self.dates.normalize_timestamp(mtime)?));
        Ok(())
    }

    fn add_defaults(&self, doc: &mut NormalizedDocument) {
        for (field, default) in self.rules.defaults() {
            if doc.is_unset(field) {
                doc.set(field, default.to_value());
            }
        }
    }
}
