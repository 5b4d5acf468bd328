//! Crawl orchestration.
//!
//! Walks the archive, and for every directory holding JSON files:
//! skip list → imaging-export split or document mapping → path rewrite →
//! store. Directories are processed one at a time and to completion. No
//! per-directory failure stops the crawl; each is logged and counted in
//! [`CrawlStats`].

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::{debug, error, info};

use crate::config::{Config, Mode, PathRewrite};
use crate::db;
use crate::error::MappingError;
use crate::groups::lookup_from_config;
use crate::mapper::{DocumentMapper, MapOutcome};
use crate::models::NormalizedDocument;
use crate::splitter::ImagingSplitter;
use crate::store::{DocumentStore, InMemoryStore, SqliteDocumentStore};
use crate::walker::ArchiveWalker;

/// Per-crawl counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub scanned: usize,
    pub skipped: usize,
    pub unclassified: usize,
    pub mapped: usize,
    pub split_documents: usize,
    pub unmatched_keys: usize,
    pub ingested: usize,
    /// Documents the store rejected.
    pub failed: usize,
    /// Directories that could not be mapped or split at all.
    pub errors: usize,
    pub conflicts: usize,
}

pub struct ArchiveCrawler {
    walker: ArchiveWalker,
    mapper: DocumentMapper,
    splitter: Option<ImagingSplitter>,
    rewrite: Option<PathRewrite>,
    store: Arc<dyn DocumentStore>,
}

impl ArchiveCrawler {
    pub fn new(
        walker: ArchiveWalker,
        mapper: DocumentMapper,
        splitter: Option<ImagingSplitter>,
        rewrite: Option<PathRewrite>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            walker,
            mapper,
            splitter,
            rewrite,
            store,
        }
    }

    /// Assemble a crawler from configuration, crawling `root`.
    pub fn from_config(config: &Config, root: &Path, store: Arc<dyn DocumentStore>) -> Result<Self> {
        let walker = ArchiveWalker::from_config(config, root)?;
        let mapper = DocumentMapper::from_config(config, lookup_from_config(config)?)?;
        let splitter = match &config.split {
            Some(split) => Some(ImagingSplitter::new(
                split,
                mapper.template().clone(),
                mapper.dates().clone(),
                mapper.fields().clone(),
            )?),
            None => None,
        };
        Ok(Self::new(
            walker,
            mapper,
            splitter,
            config.archive.path_rewrite.clone(),
            store,
        ))
    }

    pub fn skip_directory(&self, dir: &Path) -> bool {
        self.walker.should_skip(dir)
    }

    /// Crawl every JSON directory under the root, at most `limit` of them.
    pub async fn crawl(&self, limit: Option<usize>) -> Result<CrawlStats> {
        let mut dirs = self.walker.json_dirs();
        if let Some(lim) = limit {
            dirs.truncate(lim);
        }

        let mut stats = CrawlStats::default();
        for dir in &dirs {
            self.crawl_dir(dir, &mut stats).await;
        }
        Ok(stats)
    }

    /// Process one directory, updating `stats`.
    pub async fn crawl_dir(&self, dir: &Path, stats: &mut CrawlStats) {
        stats.scanned += 1;
        info!("Scanning dir {}", dir.display());

        if self.skip_directory(dir) {
            info!("Skipping directory {}", dir.display());
            stats.skipped += 1;
            return;
        }

        if let Some(splitter) = self.splitter.as_ref().filter(|s| s.is_split_dir(dir)) {
            info!("Splitting imaging export {}", dir.display());
            match splitter.split(dir) {
                Ok(outcome) => {
                    stats.split_documents += outcome.documents.len();
                    stats.unmatched_keys += outcome.skipped.len();
                    for doc in outcome.documents {
                        self.store_document(dir, doc, stats).await;
                    }
                }
                Err(e) => {
                    error!("Could not split imaging export {}: {:#}", dir.display(), e);
                    stats.errors += 1;
                }
            }
            return;
        }

        match self.mapper.create_document(dir) {
            Ok(MapOutcome::Unclassified) => {
                error!(
                    "{}",
                    MappingError::Unclassified {
                        dir: dir.display().to_string()
                    }
                );
                stats.unclassified += 1;
            }
            Ok(MapOutcome::Mapped(mapped)) => {
                stats.mapped += 1;
                stats.conflicts += mapped.conflicts().count();
                self.store_document(dir, mapped.document, stats).await;
            }
            Err(e) => {
                error!("Could not create new document from directory {}: {:#}", dir.display(), e);
                stats.errors += 1;
            }
        }
    }

    async fn store_document(&self, dir: &Path, mut doc: NormalizedDocument, stats: &mut CrawlStats) {
        if let Some(rewrite) = &self.rewrite {
            let field = self.mapper.fields().archive_path.as_str();
            if let Some(path) = doc.get_str(field).map(|p| rewrite.apply(p)) {
                doc.set(field, serde_json::Value::String(path));
            }
        }

        match self.store.ingest(&doc).await {
            Ok(()) => {
                info!("Successfully ingested document for directory {}", dir.display());
                stats.ingested += 1;
            }
            Err(e) => {
                error!(
                    "{}",
                    MappingError::Persistence {
                        dir: dir.display().to_string(),
                        reason: format!("{:#}", e),
                    }
                );
                if let Ok(body) = serde_json::to_string_pretty(&doc) {
                    debug!("{}", body);
                }
                stats.failed += 1;
            }
        }
    }
}

/// Run the `crawl` command and print a summary.
pub async fn run_crawl(
    config: &Config,
    mode: Mode,
    root: &Path,
    dry_run: bool,
    limit: Option<usize>,
) -> Result<()> {
    let key_field = config.fields.archive_path.clone();

    let mut pool: Option<SqlitePool> = None;
    let store: Arc<dyn DocumentStore> = if dry_run {
        Arc::new(InMemoryStore::new(key_field))
    } else {
        let (_, p) = db::open_store(config, mode).await?;
        pool = Some(p.clone());
        Arc::new(SqliteDocumentStore::new(p, key_field))
    };

    let crawler = ArchiveCrawler::from_config(config, root, store)?;
    let stats = crawler.crawl(limit).await?;

    if dry_run {
        println!("crawl {} (dry-run)", root.display());
    } else {
        println!("crawl {} ({})", root.display(), mode.as_str());
    }
    println!("  directories scanned: {}", stats.scanned);
    println!("  skipped: {}", stats.skipped);
    println!("  unclassified: {}", stats.unclassified);
    println!("  mapped: {}", stats.mapped);
    println!("  split documents: {}", stats.split_documents);
    if stats.unmatched_keys > 0 {
        println!("  unmatched split keys: {}", stats.unmatched_keys);
    }
    println!("  ingested: {}", stats.ingested);
    println!("  failed: {}", stats.failed);
    if stats.errors > 0 {
        println!("  errors: {}", stats.errors);
    }
    println!("  conflicts: {}", stats.conflicts);
    println!("ok");

    if let Some(pool) = pool {
        pool.close().await;
    }
    Ok(())
}
