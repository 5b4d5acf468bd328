//! Tracing subscriber setup.
//!
//! A crawl writes every event at `[crawl].log_level` (or `RUST_LOG`) to a
//! timestamped file under the log directory. The console only shows
//! warnings and errors unless `RUST_LOG` says otherwise.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::CrawlConfig;

/// Log directory used when `[crawl].log_dir` is unset.
pub fn default_log_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("archive_crawler_logs")
}

/// `archive_crawler_log_<YYYYmmdd-HHMMSS>.txt`
pub fn log_file_name(now: chrono::DateTime<chrono::Local>) -> String {
    format!("archive_crawler_log_{}.txt", now.format("%Y%m%d-%H%M%S"))
}

fn console_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install console and file logging for a crawl.
///
/// Returns the log file path and the appender guard; dropping the guard
/// flushes the file.
pub fn init_logging(config: &CrawlConfig, base_dir: &Path) -> Result<(PathBuf, WorkerGuard)> {
    let log_dir = match &config.log_dir {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => base_dir.join(dir),
        None => default_log_dir(),
    };
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_name = log_file_name(chrono::Local::now());
    let log_path = log_dir.join(&file_name);

    let file_appender = tracing_appender::rolling::never(&log_dir, &file_name);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .with_context(|| format!("Invalid crawl.log_level: '{}'", config.log_level))?;

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(writer)
        .with_filter(file_filter);

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter());

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok((log_path, guard))
}

/// Console-only logging for the short commands.
pub fn init_console_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(console_filter()),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_log_file_name() {
        let now = chrono::Local.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(log_file_name(now), "archive_crawler_log_20210304-050607.txt");
    }

    #[test]
    fn test_default_log_dir() {
        assert!(default_log_dir().ends_with("archive_crawler_logs"));
    }
}
