//! Indexing engine
//!
//! Turns one feature into one upsert:
//!
//! 1. Skip the Earth record (id 0)
//! 2. Derive the geometry payload for the configured mode
//! 3. Resolve the placetype code
//! 4. Require a non-empty `wof:repo`
//! 5. Resolve the parent id, defaulting to -1
//! 6. Compute the deprecated / superseded flags
//! 7. Encode the metadata summary
//! 8. Upsert, unless this is a dry run
//!
//! The engine owns no concurrency; batch drivers fan calls out across
//! workers and the sink's connection pool bounds database sessions.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wof_common::{Feature, Placetypes, EARTH_ID};

use crate::config::{IndexerConfig, IndexerOptions};
use crate::error::{IndexError, IndexResult};
use crate::geometry::GeometryMode;
use crate::meta::Meta;
use crate::pool::ConnectionPool;
use crate::store::{PgRecordSink, RecordSink, WofRecord, UNKNOWN_PARENT};

/// Whether a prepared statement is actually issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    #[default]
    Apply,
    /// Build every record but never touch the store
    DryRun,
}

/// What happened to a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Indexed(i64),
    /// The record was deliberately not indexed (the Earth record)
    Skipped(i64),
    DryRun(i64),
}

/// Immutable indexing client, cheap to clone across worker tasks
pub struct Indexer<S> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    options: IndexerOptions,
    placetypes: Placetypes,
    sink: S,
}

impl<S> Clone for Indexer<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Indexer writing to PostGIS
pub type PgIndexer = Indexer<PgRecordSink>;

impl PgIndexer {
    /// Validate the configuration and connect; fails fast if the store is unreachable
    pub async fn connect(config: &IndexerConfig) -> IndexResult<Self> {
        config.validate()?;
        let pool = ConnectionPool::connect(&config.database).await?;
        Ok(Self::new(PgRecordSink::new(pool), config.options.clone()))
    }
}

impl<S: RecordSink> Indexer<S> {
    pub fn new(sink: S, options: IndexerOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                options,
                placetypes: Placetypes::new(),
                sink,
            }),
        }
    }

    pub fn options(&self) -> &IndexerOptions {
        &self.inner.options
    }

    pub fn geometry_mode(&self) -> &GeometryMode {
        &self.inner.options.geometry
    }

    pub fn sink(&self) -> &S {
        &self.inner.sink
    }

    /// Load a feature from disk and index it
    pub async fn index_file(
        &self,
        path: &Path,
        collection: &str,
        execution: Execution,
    ) -> IndexResult<IndexOutcome> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| IndexError::io(path, e))?;
        let feature = Feature::from_slice(&bytes)?;

        debug!(path = %path.display(), id = feature.id(), "Loaded feature");
        self.index_feature(&feature, collection, execution).await
    }

    /// Index one feature
    pub async fn index_feature(
        &self,
        feature: &Feature,
        collection: &str,
        execution: Execution,
    ) -> IndexResult<IndexOutcome> {
        let Some(record) = self.prepare(feature, collection)? else {
            return Ok(IndexOutcome::Skipped(feature.id()));
        };

        if self.inner.options.verbose {
            let elide = matches!(self.inner.options.geometry, GeometryMode::Default);
            info!(
                id = record.id,
                collection,
                statement = %record.statement_preview(elide),
                "Upserting record"
            );
        }

        match execution {
            Execution::DryRun => Ok(IndexOutcome::DryRun(record.id)),
            Execution::Apply => {
                self.inner.sink.upsert(&record).await?;
                Ok(IndexOutcome::Indexed(record.id))
            },
        }
    }

    /// Build the row for a feature without writing it
    ///
    /// Returns `None` for the Earth record, which is never indexed.
    pub fn prepare(&self, feature: &Feature, collection: &str) -> IndexResult<Option<WofRecord>> {
        let id = feature.id();

        if id == EARTH_ID {
            info!(id, "Skipping Earth");
            return Ok(None);
        }

        if collection.trim().is_empty() {
            return Err(IndexError::EmptyCollection { id });
        }

        let geom = self.inner.options.geometry.derive(feature)?;

        let placetype = self.inner.placetypes.by_name(feature.placetype())?;

        match feature.string_property("wof:repo") {
            None => return Err(IndexError::MissingRepo { id }),
            Some("") => return Err(IndexError::EmptyRepo { id }),
            Some(_) => {},
        }

        let parent_id = feature.int_property("wof:parent_id").unwrap_or_else(|| {
            warn!(id, "Failed to determine parent ID");
            UNKNOWN_PARENT
        });

        let meta = Meta::from_feature(feature).encode(id)?;

        Ok(Some(WofRecord {
            id,
            parent_id,
            placetype_id: placetype.id,
            is_superseded: i16::from(feature.is_superseded()),
            is_deprecated: i16::from(feature.is_deprecated()),
            meta,
            geom,
        }))
    }
}
