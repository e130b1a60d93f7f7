//! Who's On First PostGIS Indexer
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Loads Who's On First GeoJSON records into a PostGIS `whosonfirst` table.
//!
//! # Overview
//!
//! - **Engine**: turns one feature into one idempotent upsert, deriving the
//!   geometry, placetype code, parent, status flags and metadata summary
//! - **Geometry Strategies**: full geometry, bounding box (per feature or per
//!   polygon) or centroid point, fixed per indexer
//! - **Connection Pool**: a fixed number of database sessions handed out as
//!   tokens; callers block until one is free
//! - **Batch Drivers**: directory crawl, file list, CSV meta manifest and
//!   explicit paths, fanned out over a bounded set of workers
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use wof_pgis::{CrawlOptions, Execution, IndexerConfig, PgIndexer};
//!
//! # async fn run() -> wof_pgis::IndexResult<()> {
//! let indexer = PgIndexer::connect(&IndexerConfig::default()).await?;
//! let report = indexer
//!     .index_directory(
//!         Path::new("/usr/local/data/whosonfirst-data/data"),
//!         "whosonfirst-data",
//!         CrawlOptions::default(),
//!         Execution::Apply,
//!     )
//!     .await?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod crawl;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod meta;
pub mod pool;
pub mod store;

pub use batch::{BatchReport, RecordFailure};
pub use config::{DatabaseConfig, IndexerConfig, IndexerOptions};
pub use crawl::CrawlOptions;
pub use engine::{Execution, IndexOutcome, Indexer, PgIndexer};
pub use error::{IndexError, IndexResult};
pub use geometry::{GeometryMode, GeometryPayload};
pub use pool::{ConnectionPool, Session};
pub use store::{MemorySink, PgRecordSink, RecordSink, WofRecord};
