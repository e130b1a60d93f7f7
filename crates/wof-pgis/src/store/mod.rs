//! Record storage
//!
//! A [`RecordSink`] performs one idempotent upsert per record. The PostGIS
//! implementation issues a single `INSERT ... ON CONFLICT (id) DO UPDATE`
//! statement; [`MemorySink`] keeps rows in a map for tests and dry runs.

mod memory;
mod postgres;

pub use memory::MemorySink;
pub use postgres::{PgRecordSink, UPSERT_SQL};

use async_trait::async_trait;

use crate::error::IndexResult;
use crate::geometry::GeometryPayload;

/// Parent id stored when a feature's parent cannot be determined
pub const UNKNOWN_PARENT: i64 = -1;

/// One row of the `whosonfirst` table, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WofRecord {
    pub id: i64,
    pub parent_id: i64,
    pub placetype_id: i64,
    pub is_superseded: i16,
    pub is_deprecated: i16,
    /// Serialized metadata summary
    pub meta: String,
    pub geom: GeometryPayload,
}

impl WofRecord {
    /// Human readable form of the upsert, as logged in verbose mode
    pub fn statement_preview(&self, elide_geometry: bool) -> String {
        let geom = if elide_geometry {
            "...".to_string()
        } else {
            self.geom.to_string()
        };

        format!(
            "INSERT INTO whosonfirst (id, parent_id, placetype_id, is_superseded, is_deprecated, meta, geom) \
             VALUES ({}, {}, {}, {}, {}, '{}', ST_GeomFromGeoJSON('{}'))",
            self.id, self.parent_id, self.placetype_id, self.is_superseded, self.is_deprecated, self.meta, geom
        )
    }
}

/// Destination for indexed records
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Insert the record, or overwrite every non-key column if its id exists
    async fn upsert(&self, record: &WofRecord) -> IndexResult<()>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod test_support {
    use super::*;

    pub fn record(id: i64, parent_id: i64) -> WofRecord {
        WofRecord {
            id,
            parent_id,
            placetype_id: 102312317,
            is_superseded: 0,
            is_deprecated: 0,
            meta: r#"{"wof:name":"Test","wof:country":"XX","wof:hierarchy":[]}"#.to_string(),
            geom: crate::geometry::GeometryMode::Centroid
                .derive(
                    &wof_common::Feature::from_value(serde_json::json!({
                        "id": id,
                        "properties": {
                            "wof:name": "Test",
                            "wof:placetype": "locality",
                            "geom:latitude": 1.0,
                            "geom:longitude": 2.0
                        }
                    }))
                    .unwrap(),
                )
                .unwrap(),
        }
    }

    #[test]
    fn test_statement_preview_elides_geometry() {
        let preview = record(42, 7).statement_preview(true);
        assert!(preview.contains("VALUES (42, 7, 102312317, 0, 0"));
        assert!(preview.ends_with("ST_GeomFromGeoJSON('...'))"));

        let full = record(42, 7).statement_preview(false);
        assert!(full.contains(r#""type":"Point""#));
    }
}
