//! # Archive Ingest
//!
//! Crawls an archive tree, maps the legacy JSON metadata found in each
//! directory onto one fixed document schema, and ingests the result into a
//! document store.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────────┐   ┌──────────┐
//! │  Walker  │──▶│  Classify  │──▶│    Mapper    │──▶│  SQLite  │
//! │ *.json   │   │ path rules │   │ rules+dates  │   │  store   │
//! └──────────┘   └────────────┘   └──────────────┘   └──────────┘
//!        │                                ▲
//!        └──────▶ imaging-export splitter ┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! archive-crawler init --mode dev
//! archive-crawler crawl --mode dev --root-dir /archive
//! archive-crawler map /archive/gt/2020/lab_x/run1
//! archive-crawler stats --mode dev
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`keys`] | Legacy key normalization |
//! | [`dates`] | Date normalization |
//! | [`legacy`] | Legacy documents and nested lookup |
//! | [`classify`] | Directory classification |
//! | [`rules`] | Field mapping rules and defaults |
//! | [`models`] | Template and normalized document |
//! | [`groups`] | Owner and group lookup |
//! | [`mapper`] | The document mapper |
//! | [`splitter`] | Imaging-export splitting |
//! | [`walker`] | Archive directory discovery |
//! | [`crawl`] | Crawl orchestration |
//! | [`store`] | Document stores |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`stats`] | Store statistics |
//! | [`logging`] | Tracing setup |
//! | [`error`] | Per-directory errors |

pub mod classify;
pub mod config;
pub mod crawl;
pub mod dates;
pub mod db;
pub mod error;
pub mod groups;
pub mod keys;
pub mod legacy;
pub mod logging;
pub mod mapper;
pub mod migrate;
pub mod models;
pub mod rules;
pub mod splitter;
pub mod stats;
pub mod store;
pub mod walker;
