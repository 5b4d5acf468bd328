//! Imaging-export splitting.
//!
//! An imaging export keeps every record of a run in one master JSON file
//! whose top-level keys are record identifiers (`"Well: A1"`). Each record
//! matching the configured key pattern becomes its own normalized
//! document. Sizes are not recorded per record, so every record is given
//! an equal share of the directory's size.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;
use walkdir::WalkDir;

use crate::config::{FieldsConfig, SplitConfig};
use crate::dates::DateNormalizer;
use crate::error::MappingError;
use crate::models::{NormalizedDocument, Template};

pub struct ImagingSplitter {
    path_prefix: PathBuf,
    filename: String,
    key_pattern: Regex,
    group: String,
    blank_fields: Vec<String>,
    template: Template,
    dates: DateNormalizer,
    fields: FieldsConfig,
}

#[derive(Debug, Clone, Default)]
pub struct SplitOutcome {
    pub documents: Vec<NormalizedDocument>,
    pub skipped: Vec<MappingError>,
}

impl ImagingSplitter {
    pub fn new(
        config: &SplitConfig,
        template: Template,
        dates: DateNormalizer,
        fields: FieldsConfig,
    ) -> Result<Self> {
        let key_pattern = Regex::new(&format!("^(?:{})", config.key_pattern))
            .with_context(|| format!("Invalid split.key_pattern: '{}'", config.key_pattern))?;
        Ok(Self {
            path_prefix: config.path_prefix.clone(),
            filename: config.filename.clone(),
            key_pattern,
            group: config.group.clone(),
            blank_fields: config.blank_fields.clone(),
            template,
            dates,
            fields,
        })
    }

    /// True for directories under the imaging-export prefix.
    pub fn is_split_dir(&self, dir: &Path) -> bool {
        dir.starts_with(&self.path_prefix)
    }

    pub fn split(&self, dir: &Path) -> Result<SplitOutcome> {
        let master_path = dir.join(&self.filename);
        if !master_path.is_file() {
            bail!("imaging export master file missing: {}", master_path.display());
        }
        let raw = std::fs::read_to_string(&master_path)
            .with_context(|| format!("Failed to read {}", master_path.display()))?;
        let master: Map<String, Value> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", master_path.display()))?;

        let mut outcome = SplitOutcome::default();
        if master.is_empty() {
            return Ok(outcome);
        }

        let mtime = std::fs::metadata(dir)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to read modification time of {}", dir.display()))?;
        let date = self.dates.normalize_timestamp(mtime)?;
        let record_size = directory_size(dir)? / master.len() as u64;

        for (key, record) in master {
            if !self.key_pattern.is_match(&key) {
                let issue = MappingError::UnmatchedSplitKey {
                    path: master_path.display().to_string(),
                    key,
                };
                warn!("{}", issue);
                outcome.skipped.push(issue);
                continue;
            }

            let record_path = dir.join(key.replace(": ", "_"));
            let mut doc = self.template.blank();
            for field in &self.blank_fields {
                doc.set(field, Value::String(String::new()));
            }
            doc.set(&self.fields.status, Value::from("completed"));
            doc.set(
                &self.fields.archive_path,
                Value::String(record_path.display().to_string()),
            );
            doc.set(&self.fields.size, Value::from(record_size));
            doc.set(&self.fields.date, Value::String(date.clone()));
            doc.set(&self.fields.system_groups, Value::from(vec![self.group.clone()]));
            doc.set(&self.fields.catch_all, record);
            outcome.documents.push(doc);
        }

        Ok(outcome)
    }
}

/// Total size in bytes of all files beneath `dir`.
pub fn directory_size(dir: &Path) -> Result<u64> {
    let mut total = 0u64;
    for entry in WalkDir::new(dir) {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        if entry.file_type().is_file() {
            total += entry
                .metadata()
                .with_context(|| format!("Failed to stat {}", entry.path().display()))?
                .len();
        }
    }
    Ok(total)
}
