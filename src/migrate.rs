use anyhow::Result;
use sqlx::SqlitePool;

/// Create the store schema. Safe to run repeatedly.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // One row per archived directory (or split record)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            archived_path TEXT,
            body TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            ingested_at INTEGER NOT NULL,
            UNIQUE(archived_path)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_ingested_at ON documents(ingested_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::Template;
    use crate::store::{DocumentStore, SqliteDocumentStore};
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_migrations_idempotent_and_upsert() {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect(&tmp.path().join("data/dev.sqlite")).await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let store = SqliteDocumentStore::new(pool.clone(), "archived_path");
        let mut doc = Template::new(["archived_path", "notes"]).blank();
        doc.set("archived_path", json!("/archive/gt/run1"));
        doc.set("notes", json!("first"));
        store.ingest(&doc).await.unwrap();
        doc.set("notes", json!("second"));
        store.ingest(&doc).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let body: String = sqlx::query_scalar("SELECT body FROM documents")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(body.contains("second"));
        pool.close().await;
    }
}
