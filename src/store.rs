//! Document store abstraction.
//!
//! The crawler hands each finished [`NormalizedDocument`] to a
//! [`DocumentStore`]. A failed `ingest` is reported by the caller and the
//! crawl continues; there is no retry or queueing.
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`SqliteDocumentStore`] | dev / prod stores |
//! | [`InMemoryStore`] | tests and dry runs |

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::NormalizedDocument;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist one document. Documents with the same archive path replace
    /// each other.
    async fn ingest(&self, doc: &NormalizedDocument) -> Result<()>;

    /// Number of stored documents.
    async fn count(&self) -> Result<i64>;
}

/// SHA-256 of the document's JSON body.
pub fn content_hash(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// SQLite-backed store.
pub struct SqliteDocumentStore {
    pool: SqlitePool,
    key_field: String,
}

impl SqliteDocumentStore {
    /// `key_field` names the document field used as the upsert key.
    pub fn new(pool: SqlitePool, key_field: impl Into<String>) -> Self {
        Self {
            pool,
            key_field: key_field.into(),
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn ingest(&self, doc: &NormalizedDocument) -> Result<()> {
        let body = serde_json::to_string(doc)?;
        let hash = content_hash(&body);
        let archived_path = doc.get_str(&self.key_field).map(str::to_string);
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO documents (id, archived_path, body, content_hash, ingested_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(archived_path) DO UPDATE SET
                body = excluded.body,
                content_hash = excluded.content_hash,
                ingested_at = excluded.ingested_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&archived_path)
        .bind(&body)
        .bind(&hash)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

/// In-memory store. Keeps every ingested document in order; documents
/// sharing a key replace the earlier copy in place.
pub struct InMemoryStore {
    docs: RwLock<Vec<NormalizedDocument>>,
    key_field: String,
    reject: RwLock<Option<String>>,
}

impl InMemoryStore {
    pub fn new(key_field: impl Into<String>) -> Self {
        Self {
            docs: RwLock::new(Vec::new()),
            key_field: key_field.into(),
            reject: RwLock::new(None),
        }
    }

    pub fn documents(&self) -> Vec<NormalizedDocument> {
        self.docs.read().map(|d| d.clone()).unwrap_or_default()
    }

    /// Make every subsequent `ingest` whose key contains `needle` fail.
    pub fn reject_matching(&self, needle: impl Into<String>) {
        if let Ok(mut reject) = self.reject.write() {
            *reject = Some(needle.into());
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn ingest(&self, doc: &NormalizedDocument) -> Result<()> {
        let key = doc.get_str(&self.key_field).map(str::to_string);

        let reject = self
            .reject
            .read()
            .map_err(|_| anyhow!("store lock poisoned"))?
            .clone();
        if let (Some(needle), Some(key)) = (reject, key.as_deref()) {
            if key.contains(&needle) {
                return Err(anyhow!("document rejected: {}", key));
            }
        }

        let mut docs = self.docs.write().map_err(|_| anyhow!("store lock poisoned"))?;
        let existing = key.as_deref().and_then(|k| {
            docs.iter()
                .position(|d| d.get_str(&self.key_field) == Some(k))
        });
        match existing {
            Some(i) => docs[i] = doc.clone(),
            None => docs.push(doc.clone()),
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let docs = self.docs.read().map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(docs.len() as i64)
    }
}
