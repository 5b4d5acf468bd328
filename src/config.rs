//! TOML configuration.
//!
//! Everything the crawler needs is read once at startup from a single TOML
//! file: where the archive lives, the template that fixes the output field
//! set, how to classify directories, how to map each legacy document type,
//! the default values, and where each store mode writes.
//!
//! ```toml
//! [archive]
//! root = "/archive"
//! template = "template.json"
//!
//! [[documents]]
//! tag = "info"
//! filename = "info.json"
//!
//! [categories]
//! exclude_patterns = ["/test/", "\\.old$"]
//!
//! [[categories.rules]]
//! pattern = "/archive/gt/"
//! category = "gt"
//!
//! [mappings.gt_info]
//! project_name = "project_name"
//! manager_user_id = "sample > owner_id"
//! user_metadata = "true"
//!
//! [defaults]
//! archival_status = "str:completed"
//!
//! [store.dev]
//! path = "./data/dev.sqlite"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::classify::Classifier;
use crate::dates::DateNormalizer;

/// Which document store a run writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    Dev,
    Prod,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Dev => "dev",
            Mode::Prod => "prod",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub fields: FieldsConfig,
    #[serde(default)]
    pub dates: DatesConfig,
    #[serde(default)]
    pub documents: Vec<LegacyDocConfig>,
    #[serde(default)]
    pub categories: CategoriesConfig,
    /// `<category>_<doctag>` → ordered target-field → source-reference table.
    #[serde(default)]
    pub mappings: toml::Table,
    /// Target field → `"type:value"` literal.
    #[serde(default)]
    pub defaults: toml::Table,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub split: Option<SplitConfig>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub groups: Option<GroupsConfig>,
    /// Directory relative paths in this config resolve against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    #[serde(default = "default_archive_root")]
    pub root: PathBuf,
    pub template: PathBuf,
    #[serde(default)]
    pub path_rewrite: Option<PathRewrite>,
}

fn default_archive_root() -> PathBuf {
    PathBuf::from("/archive")
}

/// Prefix substitution applied to stored archive paths.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PathRewrite {
    pub from: String,
    pub to: String,
}

impl PathRewrite {
    pub fn apply(&self, path: &str) -> String {
        match path.strip_prefix(&self.from) {
            Some(rest) => format!("{}{}", self.to, rest),
            None => path.to_string(),
        }
    }
}

/// Reserved target field names.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FieldsConfig {
    pub catch_all: String,
    pub date: String,
    pub archive_path: String,
    pub manager_user_id: String,
    pub user_id: String,
    pub system_groups: String,
    pub status: String,
    pub size: String,
    /// Identifier field the group lookup is keyed on.
    pub group_lookup_key: String,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            catch_all: "user_metadata".to_string(),
            date: "date_archived".to_string(),
            archive_path: "archived_path".to_string(),
            manager_user_id: "manager_user_id".to_string(),
            user_id: "user_id".to_string(),
            system_groups: "system_groups".to_string(),
            status: "archival_status".to_string(),
            size: "archived_size".to_string(),
            group_lookup_key: "manager_user_id".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatesConfig {
    /// Regex matched against the start of a target field name.
    pub field_pattern: String,
    /// chrono strftime output format.
    pub format: String,
}

impl Default for DatesConfig {
    fn default() -> Self {
        Self {
            field_pattern: "date".to_string(),
            format: "%Y-%m-%d".to_string(),
        }
    }
}

/// A legacy document type: its tag in mapping section names and its file.
#[derive(Debug, Deserialize, Clone)]
pub struct LegacyDocConfig {
    pub tag: String,
    pub filename: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CategoriesConfig {
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub rules: Vec<CategoryRuleConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CategoryRuleConfig {
    pub pattern: String,
    pub category: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    #[serde(default = "default_skip_globs")]
    pub skip_globs: Vec<String>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            skip_globs: default_skip_globs(),
            log_dir: None,
            log_level: default_log_level(),
        }
    }
}

fn default_skip_globs() -> Vec<String> {
    [
        "test*",
        "test*/**",
        "expired-accounts*",
        "expired-accounts*/**",
        "**/test/**",
        "**/testing/**",
        "**/*.old",
        "**/*.old/**",
        "**/*pbcoretools.tasks*",
        "**/*pbcoretools.tasks*/**",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_log_level() -> String {
    "debug".to_string()
}

/// Imaging-export directories that are split into one document per record.
#[derive(Debug, Deserialize, Clone)]
pub struct SplitConfig {
    pub path_prefix: PathBuf,
    pub filename: String,
    pub key_pattern: String,
    #[serde(default = "default_split_group")]
    pub group: String,
    #[serde(default = "default_split_blank_fields")]
    pub blank_fields: Vec<String>,
}

fn default_split_group() -> String {
    "jaxuser".to_string()
}

fn default_split_blank_fields() -> Vec<String> {
    [
        "classification",
        "grant_id",
        "manager_user_id",
        "notes",
        "project_name",
        "source_path",
        "user_id",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreConfig {
    pub dev: Option<DbConfig>,
    pub prod: Option<DbConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GroupsConfig {
    pub directory: PathBuf,
}

impl Config {
    /// Resolve a configured path against the config file's directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn template_path(&self) -> PathBuf {
        self.resolve_path(&self.archive.template)
    }

    /// Database path for the given mode.
    pub fn store_path(&self, mode: Mode) -> Result<PathBuf> {
        let db = match mode {
            Mode::Dev => self.store.dev.as_ref(),
            Mode::Prod => self.store.prod.as_ref(),
        };
        match db {
            Some(db) => Ok(self.resolve_path(&db.path)),
            None => bail!("store.{} is not configured", mode.as_str()),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    parse_config(&content, &base_dir)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str, base_dir: &Path) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.base_dir = base_dir.to_path_buf();

    // Validate legacy document types
    let mut tags = HashSet::new();
    for doc in &config.documents {
        if doc.tag.trim().is_empty() || doc.filename.trim().is_empty() {
            bail!("documents entries need a non-empty tag and filename");
        }
        if !tags.insert(doc.tag.as_str()) {
            bail!("duplicate document tag: '{}'", doc.tag);
        }
    }

    // Validate patterns
    Classifier::new(&config.categories.rules, &config.categories.exclude_patterns)?;
    regex::Regex::new(&config.dates.field_pattern)
        .with_context(|| format!("Invalid dates.field_pattern: '{}'", config.dates.field_pattern))?;
    DateNormalizer::new(&config.dates.format)?;

    for glob in &config.crawl.skip_globs {
        globset::Glob::new(glob).with_context(|| format!("Invalid crawl.skip_globs entry: '{}'", glob))?;
    }

    if let Some(split) = &config.split {
        regex::Regex::new(&split.key_pattern)
            .with_context(|| format!("Invalid split.key_pattern: '{}'", split.key_pattern))?;
        if split.filename.trim().is_empty() {
            bail!("split.filename must not be empty");
        }
    }

    if let Some(rewrite) = &config.archive.path_rewrite {
        if rewrite.from.is_empty() {
            bail!("archive.path_rewrite.from must not be empty");
        }
    }

    // Mapping sections must be tables
    for (section, value) in &config.mappings {
        if !value.is_table() {
            bail!("mappings.{} must be a table", section);
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[archive]
template = "template.json"
"#;

    #[test]
    fn test_minimal_defaults() {
        let cfg = parse_config(MINIMAL, Path::new("/etc/crawler")).unwrap();
        assert_eq!(cfg.archive.root, PathBuf::from("/archive"));
        assert_eq!(cfg.template_path(), PathBuf::from("/etc/crawler/template.json"));
        assert_eq!(cfg.fields.catch_all, "user_metadata");
        assert_eq!(cfg.dates.format, "%Y-%m-%d");
        assert_eq!(cfg.crawl.log_level, "debug");
        assert!(!cfg.crawl.skip_globs.is_empty());
        assert!(cfg.documents.is_empty());
        assert!(cfg.split.is_none());
    }

    #[test]
    fn test_store_path_per_mode() {
        let text = format!("{MINIMAL}\n[store.dev]\npath = \"data/dev.sqlite\"\n");
        let cfg = parse_config(&text, Path::new("/srv")).unwrap();
        assert_eq!(cfg.store_path(Mode::Dev).unwrap(), PathBuf::from("/srv/data/dev.sqlite"));
        assert!(cfg.store_path(Mode::Prod).is_err());
    }

    #[test]
    fn test_documents_keep_order() {
        let text = format!(
            "{MINIMAL}\n[[documents]]\ntag = \"info\"\nfilename = \"info.json\"\n\n[[documents]]\ntag = \"archived\"\nfilename = \"archived.json\"\n"
        );
        let cfg = parse_config(&text, Path::new(".")).unwrap();
        let tags: Vec<_> = cfg.documents.iter().map(|d| d.tag.as_str()).collect();
        assert_eq!(tags, vec!["info", "archived"]);
    }

    #[test]
    fn test_duplicate_document_tag_rejected() {
        let text = format!(
            "{MINIMAL}\n[[documents]]\ntag = \"info\"\nfilename = \"a.json\"\n\n[[documents]]\ntag = \"info\"\nfilename = \"b.json\"\n"
        );
        let err = parse_config(&text, Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("duplicate document tag"));
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        let bad_rule = format!("{MINIMAL}\n[[categories.rules]]\npattern = \"(\"\ncategory = \"x\"\n");
        assert!(parse_config(&bad_rule, Path::new(".")).is_err());

        let bad_format = format!("{MINIMAL}\n[dates]\nformat = \"%Q\"\n");
        assert!(parse_config(&bad_format, Path::new(".")).is_err());
    }

    #[test]
    fn test_missing_template_rejected() {
        assert!(parse_config("[archive]\nroot = \"/archive\"\n", Path::new(".")).is_err());
    }

    #[test]
    fn test_path_rewrite() {
        let rewrite = PathRewrite {
            from: "/archive".to_string(),
            to: "/bharchive".to_string(),
        };
        assert_eq!(rewrite.apply("/archive/gt/run1"), "/bharchive/gt/run1");
        assert_eq!(rewrite.apply("/data/gt/run1"), "/data/gt/run1");
    }
}
