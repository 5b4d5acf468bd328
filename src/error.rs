//! Per-directory error taxonomy.
//!
//! None of these abort a crawl. They are logged with directory context,
//! counted, and the crawl moves on. Startup failures (bad config, missing
//! root) stay as `anyhow` errors and are fatal.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    #[error("no category matches {dir}")]
    Unclassified { dir: String },

    #[error("conflicting values for {field} in {dir}: kept {existing}, ignored {incoming}")]
    FieldConflict {
        dir: String,
        field: String,
        existing: Value,
        incoming: Value,
    },

    #[error("unparseable date for {field} in {dir}: {raw}")]
    InvalidDate {
        dir: String,
        field: String,
        raw: String,
    },

    #[error("unreadable legacy document {path}: {reason}")]
    UnreadableDocument { path: String, reason: String },

    #[error("key '{key}' in {path} does not match the split pattern")]
    UnmatchedSplitKey { path: String, key: String },

    #[error("could not store document for {dir}: {reason}")]
    Persistence { dir: String, reason: String },
}

impl MappingError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, MappingError::FieldConflict { .. })
    }
}
