use async_trait::async_trait;
use sqlx::postgres::PgConnection;
use tracing::{debug, info};

use super::{RecordSink, WofRecord};
use crate::error::IndexResult;
use crate::pool::ConnectionPool;

/// Single-statement upsert keyed on `id`
///
/// The geometry is bound as GeoJSON text and built server side, so PostGIS
/// validates it before the row is touched.
pub const UPSERT_SQL: &str = r#"
    INSERT INTO whosonfirst (id, parent_id, placetype_id, is_superseded, is_deprecated, meta, geom)
    VALUES ($1, $2, $3, $4, $5, $6::json, ST_SetSRID(ST_GeomFromGeoJSON($7), 4326))
    ON CONFLICT (id) DO UPDATE SET
        parent_id = EXCLUDED.parent_id,
        placetype_id = EXCLUDED.placetype_id,
        is_superseded = EXCLUDED.is_superseded,
        is_deprecated = EXCLUDED.is_deprecated,
        meta = EXCLUDED.meta,
        geom = ST_SetSRID(ST_GeomFromGeoJSON($7), 4326)
"#;

const SELECT_SQL: &str = r#"
    SELECT id, parent_id, placetype_id, is_superseded, is_deprecated,
           meta::text AS meta, ST_AsGeoJSON(geom) AS geom
    FROM whosonfirst
    WHERE id = $1
"#;

/// A row as read back from the store; `geom` is rendered by `ST_AsGeoJSON`
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StoredRecord {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub placetype_id: Option<i64>,
    pub is_superseded: Option<i16>,
    pub is_deprecated: Option<i16>,
    pub meta: Option<String>,
    pub geom: Option<String>,
}

/// PostGIS-backed record sink
#[derive(Debug, Clone)]
pub struct PgRecordSink {
    pool: ConnectionPool,
}

impl PgRecordSink {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Create the PostGIS extension and the `whosonfirst` table
    pub async fn migrate(&self) -> IndexResult<()> {
        info!("Running database migrations");
        sqlx::migrate!("../../migrations").run(self.pool.pg()).await?;
        Ok(())
    }

    /// Read a stored row back by id
    pub async fn fetch(&self, id: i64) -> IndexResult<Option<StoredRecord>> {
        let mut session = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, StoredRecord>(SELECT_SQL)
            .bind(id)
            .fetch_optional(&mut *session)
            .await?;
        Ok(row)
    }
}

#[async_trait]
impl RecordSink for PgRecordSink {
    async fn upsert(&self, record: &WofRecord) -> IndexResult<()> {
        let mut session = self.pool.acquire().await?;
        execute_upsert(&mut session, record).await
    }
}

async fn execute_upsert(conn: &mut PgConnection, record: &WofRecord) -> IndexResult<()> {
    sqlx::query(UPSERT_SQL)
        .bind(record.id)
        .bind(record.parent_id)
        .bind(record.placetype_id)
        .bind(record.is_superseded)
        .bind(record.is_deprecated)
        .bind(&record.meta)
        .bind(record.geom.as_str())
        .execute(conn)
        .await?;

    debug!(id = record.id, "Record upserted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_is_single_conflict_statement() {
        let sql = UPSERT_SQL.to_lowercase();
        assert_eq!(sql.matches("insert into whosonfirst").count(), 1);
        assert!(sql.contains("on conflict (id) do update set"));
        assert!(!sql.contains("delete"));
        assert_eq!(sql.matches("st_geomfromgeojson($7)").count(), 2);
    }

    #[test]
    fn test_upsert_overwrites_every_non_key_column() {
        for column in ["parent_id", "placetype_id", "is_superseded", "is_deprecated", "meta", "geom"] {
            assert!(
                UPSERT_SQL.contains(&format!("{} = ", column)),
                "{} is not updated on conflict",
                column
            );
        }
    }
}
