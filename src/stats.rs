//! Store statistics.
//!
//! Quick look at what a crawl left behind: document count, database size,
//! and when the most recent document was ingested. Used by
//! `archive-crawler stats`.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::{Config, Mode};
use crate::db;

/// Aggregate figures for one store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub documents: i64,
    pub distinct_hashes: i64,
    pub without_path: i64,
    pub last_ingested: Option<i64>,
}

pub async fn collect_stats(pool: &SqlitePool) -> Result<StoreStats> {
    let row = sqlx::query(
        r#"
        SELECT
            COUNT(*) AS documents,
            COUNT(DISTINCT content_hash) AS distinct_hashes,
            SUM(CASE WHEN archived_path IS NULL THEN 1 ELSE 0 END) AS without_path,
            MAX(ingested_at) AS last_ingested
        FROM documents
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(StoreStats {
        documents: row.get("documents"),
        distinct_hashes: row.get("distinct_hashes"),
        without_path: row.get::<Option<i64>, _>("without_path").unwrap_or(0),
        last_ingested: row.get("last_ingested"),
    })
}

/// Run the stats command: query the store and print a summary.
pub async fn run_stats(config: &Config, mode: Mode) -> Result<()> {
    let (db_path, pool) = db::open_store(config, mode).await?;

    let stats = collect_stats(&pool).await?;
    let db_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    println!("Archive Crawler - Store Stats ({})", mode.as_str());
    println!("==================================");
    println!();
    println!("  Database:      {}", db_path.display());
    println!("  Size:          {}", human_size(db_size));
    println!();
    println!("  Documents:     {}", stats.documents);
    println!("  Unique bodies: {}", stats.distinct_hashes);
    if stats.without_path > 0 {
        println!("  Without path:  {}", stats.without_path);
    }
    println!(
        "  Last ingest:   {}",
        match stats.last_ingested {
            Some(ts) => format_ts_relative(ts),
            None => "never".to_string(),
        }
    );
    println!();

    pool.close().await;
    Ok(())
}

/// Database file size in binary units, one decimal past bytes.
fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit + 1 < UNITS.len() {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        format_ts_iso(ts)
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use crate::models::Template;
    use crate::store::{DocumentStore, SqliteDocumentStore};
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(human_size(3 << 40), "3.0 TB");
        assert_eq!(human_size(5000 << 40), "5000.0 TB");
    }

    #[test]
    fn test_format_ts_relative() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 7200), "2 hours ago");
        assert_eq!(format_ts_relative(0), "1970-01-01 00:00");
    }

    #[tokio::test]
    async fn test_collect_stats() {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect(&tmp.path().join("stats.sqlite")).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();

        let empty = collect_stats(&pool).await.unwrap();
        assert_eq!(empty, StoreStats::default());

        let store = SqliteDocumentStore::new(pool.clone(), "archived_path");
        let template = Template::new(["archived_path", "notes"]);
        for path in ["/archive/a", "/archive/b"] {
            let mut doc = template.blank();
            doc.set("archived_path", json!(path));
            store.ingest(&doc).await.unwrap();
        }

        let stats = collect_stats(&pool).await.unwrap();
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.distinct_hashes, 2);
        assert_eq!(stats.without_path, 0);
        assert!(stats.last_ingested.is_some());
        pool.close().await;
    }
}
