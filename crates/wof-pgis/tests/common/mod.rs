//! Common test utilities for PostGIS integration tests using testcontainers
//!
//! Each test gets its own PostGIS container with the `whosonfirst` table
//! migrated in.

#![allow(dead_code)]

use anyhow::{Context, Result};
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::info;
use wof_pgis::{ConnectionPool, DatabaseConfig, IndexerOptions, Indexer, PgRecordSink};

/// PostGIS image used in place of the stock Postgres image
pub const POSTGIS_IMAGE: &str = "postgis/postgis";
pub const POSTGIS_TAG: &str = "16-3.4";

/// PostGIS test container wrapper
pub struct TestPostgis {
    container: ContainerAsync<Postgres>,
    config: DatabaseConfig,
}

impl TestPostgis {
    /// Start a PostGIS container that accepts `max_connections` pooled sessions
    pub async fn start(max_connections: u32) -> Result<Self> {
        info!("Starting PostGIS test container...");

        let container = Postgres::default()
            .with_name(POSTGIS_IMAGE)
            .with_tag(POSTGIS_TAG)
            .start()
            .await
            .context("Failed to start PostGIS container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let config = DatabaseConfig {
            host: host.to_string(),
            port,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            dbname: "postgres".to_string(),
            max_connections,
            ..DatabaseConfig::default()
        };

        Ok(Self { container, config })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Connect a sink and apply migrations
    pub async fn sink(&self) -> Result<PgRecordSink> {
        let pool = ConnectionPool::connect(&self.config)
            .await
            .context("Failed to connect to PostGIS")?;
        let sink = PgRecordSink::new(pool);
        sink.migrate().await.context("Failed to run migrations")?;
        Ok(sink)
    }

    pub async fn indexer(&self, options: IndexerOptions) -> Result<Indexer<PgRecordSink>> {
        Ok(Indexer::new(self.sink().await?, options))
    }
}
