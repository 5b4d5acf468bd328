use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::Config;

/// Finds archive directories holding legacy JSON metadata.
pub struct ArchiveWalker {
    root: PathBuf,
    include: GlobSet,
    skip: GlobSet,
}

impl ArchiveWalker {
    pub fn new(root: &Path, skip_globs: &[String]) -> Result<Self> {
        if !root.is_dir() {
            bail!("Crawl root is not a directory: {}", root.display());
        }
        Ok(Self {
            root: root.to_path_buf(),
            include: build_globset(&["**/*.json".to_string()])?,
            skip: build_globset(skip_globs)?,
        })
    }

    pub fn from_config(config: &Config, root: &Path) -> Result<Self> {
        Self::new(root, &config.crawl.skip_globs)
    }

    /// Every directory beneath the root containing at least one `.json`
    /// file, deduplicated and sorted.
    ///
    /// Unreadable entries are logged and skipped.
    pub fn json_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = BTreeSet::new();

        debug!("Seeking archive directories with JSON files under {}", self.root.display());
        for entry in WalkDir::new(&self.root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            if !self.include.is_match(relative) {
                continue;
            }

            if let Some(parent) = path.parent() {
                if dirs.insert(parent.to_path_buf()) {
                    debug!("Found directory {}", parent.display());
                }
            }
        }

        dirs.into_iter().collect()
    }

    /// True when `dir` matches a crawl skip glob (test areas, expired
    /// accounts, `.old` snapshots, tool scratch directories).
    pub fn should_skip(&self, dir: &Path) -> bool {
        let relative = dir.strip_prefix(&self.root).unwrap_or(dir);
        self.skip.is_match(relative)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).literal_separator(true).build()?);
    }
    Ok(builder.build()?)
}
