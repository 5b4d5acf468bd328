//! # Archive Crawler CLI (`archive-crawler`)
//!
//! ## Usage
//!
//! ```bash
//! archive-crawler --config ./config/archive-crawler.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `init` | Create the store schema for a mode |
//! | `crawl` | Crawl the archive and ingest every mapped document |
//! | `map <dir>` | Map one directory and print the document |
//! | `classify <dir>` | Print a directory's category |
//! | `stats` | Summarize a store |

use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};

use archive_ingest::classify::Classifier;
use archive_ingest::config::{self, Mode};
use archive_ingest::mapper::{DocumentMapper, MapOutcome};
use archive_ingest::{crawl, db, groups, logging, stats};

/// Crawl archive directories, map legacy metadata into a normalized
/// document, and ingest it into a document store.
#[derive(Parser)]
#[command(name = "archive-crawler", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/archive-crawler.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store schema. Safe to run repeatedly.
    Init {
        /// dev or prod store.
        #[arg(short, long, value_enum, default_value = "dev")]
        mode: Mode,
    },

    /// Crawl all directories beneath the root, map any JSON found, and
    /// ingest the results.
    Crawl {
        /// dev or prod store.
        #[arg(short, long, value_enum, default_value = "dev")]
        mode: Mode,

        /// Root directory to begin the crawl. Defaults to `[archive].root`.
        #[arg(short = 'd', long)]
        root_dir: Option<PathBuf>,

        /// Map everything but write nothing to the store.
        #[arg(long)]
        dry_run: bool,

        /// Process at most this many directories.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Map one directory and print the normalized document as JSON.
    Map {
        /// Archive directory to map.
        dir: PathBuf,
    },

    /// Print the category a directory is classified under.
    Classify {
        /// Archive directory to classify.
        dir: PathBuf,
    },

    /// Show document counts for a store.
    Stats {
        /// dev or prod store.
        #[arg(short, long, value_enum, default_value = "dev")]
        mode: Mode,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init { mode } => {
            logging::init_console_logging();
            let (_, pool) = db::open_store(&cfg, mode).await?;
            pool.close().await;
            println!("Store '{}' initialized successfully.", mode.as_str());
        }
        Commands::Crawl {
            mode,
            root_dir,
            dry_run,
            limit,
        } => {
            let (log_path, _guard) = logging::init_logging(&cfg.crawl, &cfg.base_dir)?;
            println!("Log file located at {}", log_path.display());

            let root = root_dir.unwrap_or_else(|| cfg.archive.root.clone());
            crawl::run_crawl(&cfg, mode, &root, dry_run, limit).await?;
        }
        Commands::Map { dir } => {
            logging::init_console_logging();
            let mapper = DocumentMapper::from_config(&cfg, groups::lookup_from_config(&cfg)?)?;
            match mapper.create_document(&dir)? {
                MapOutcome::Unclassified => bail!("No category matches {}", dir.display()),
                MapOutcome::Mapped(mapped) => {
                    println!("{}", serde_json::to_string_pretty(&mapped.document)?);
                }
            }
        }
        Commands::Classify { dir } => {
            let classifier =
                Classifier::new(&cfg.categories.rules, &cfg.categories.exclude_patterns)?;
            match classifier.classify(&dir.to_string_lossy()) {
                Some(category) => println!("{}", category),
                None => println!("unclassified"),
            }
        }
        Commands::Stats { mode } => {
            stats::run_stats(&cfg, mode).await?;
        }
    }

    Ok(())
}
