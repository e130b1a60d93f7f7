//! wof-pgis-index - Index Who's On First records into PostGIS

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::{error, info};
use wof_common::logging::{init_logging, LogConfig, LogLevel};
use wof_pgis::config::{
    default_workers, DEFAULT_DATABASE_HOST, DEFAULT_DATABASE_NAME, DEFAULT_DATABASE_PORT,
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_DATABASE_USER, DEFAULT_MAX_CONNECTIONS,
};
use wof_pgis::{
    BatchReport, CrawlOptions, DatabaseConfig, Execution, GeometryMode, IndexerConfig,
    IndexerOptions, PgIndexer,
};

#[derive(Parser, Debug)]
#[command(name = "wof-pgis-index")]
#[command(author, version, about = "Index Who's On First records into PostGIS")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// PostGIS host
    #[arg(long, env = "WOF_PGIS_HOST", default_value = DEFAULT_DATABASE_HOST, global = true)]
    pgis_host: String,

    /// PostGIS port
    #[arg(long, env = "WOF_PGIS_PORT", default_value_t = DEFAULT_DATABASE_PORT, global = true)]
    pgis_port: u16,

    /// PostGIS user
    #[arg(long, env = "WOF_PGIS_USER", default_value = DEFAULT_DATABASE_USER, global = true)]
    pgis_user: String,

    /// PostGIS password
    #[arg(long, env = "WOF_PGIS_PASSWORD", default_value = "", hide_env_values = true, global = true)]
    pgis_password: String,

    /// PostGIS database name
    #[arg(long, env = "WOF_PGIS_DATABASE", default_value = DEFAULT_DATABASE_NAME, global = true)]
    pgis_database: String,

    /// Maximum number of concurrent database connections
    #[arg(long, env = "WOF_PGIS_MAX_CONNECTIONS", default_value_t = DEFAULT_MAX_CONNECTIONS, global = true)]
    pgis_maxconns: u32,

    /// Seconds to wait when opening a database connection
    #[arg(long, env = "WOF_PGIS_CONNECT_TIMEOUT", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS, global = true)]
    pgis_connect_timeout: u64,

    /// Geometry to store: default, bbox, bbox-polygons or centroid
    #[arg(long, env = "WOF_PGIS_GEOMETRY", default_value = "default", value_parser = parse_geometry, global = true)]
    geometry: GeometryMode,

    /// Collection tag for the records being indexed
    #[arg(long, default_value = "whosonfirst-data", global = true)]
    collection: String,

    /// Build every statement but do not execute it
    #[arg(long, global = true)]
    debug: bool,

    /// Log each statement before it runs
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Maximum number of files indexed concurrently
    #[arg(long, env = "WOF_PGIS_WORKERS", global = true)]
    workers: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the PostGIS extension and the whosonfirst table
    Migrate,

    /// Crawl directories and index every record file found
    Directory {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Skip entries that cannot be read instead of aborting
        #[arg(long)]
        nfs_kludge: bool,
    },

    /// Index record files given on the command line
    Files {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Index files listed one path per line
    Filelist {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Index files listed in the `path` column of CSV meta files
    Meta {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Directory the `path` column is relative to
        #[arg(long)]
        data_root: PathBuf,
    },
}

/// Reject geometry modes up front rather than failing every record
fn parse_geometry(value: &str) -> std::result::Result<GeometryMode, String> {
    match GeometryMode::parse(value) {
        GeometryMode::Unsupported(mode) => Err(format!(
            "unsupported geometry mode '{}' (expected default, bbox, bbox-polygons or centroid)",
            mode
        )),
        mode => Ok(mode),
    }
}

impl Cli {
    fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            database: DatabaseConfig {
                host: self.pgis_host.clone(),
                port: self.pgis_port,
                user: self.pgis_user.clone(),
                password: self.pgis_password.clone(),
                dbname: self.pgis_database.clone(),
                max_connections: self.pgis_maxconns,
                connect_timeout_secs: self.pgis_connect_timeout,
            },
            options: IndexerOptions {
                geometry: self.geometry.clone(),
                verbose: self.verbose,
                workers: self.workers.unwrap_or_else(default_workers),
            },
        }
    }

    fn execution(&self) -> Execution {
        if self.debug {
            Execution::DryRun
        } else {
            Execution::Apply
        }
    }
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("wof-pgis-index".to_string())
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    let _guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        },
    };

    if let Err(e) = run(&cli).await {
        error!(error = %e, "Indexing failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let indexer = PgIndexer::connect(&cli.indexer_config())
        .await
        .context("Failed to connect to PostGIS")?;

    let execution = cli.execution();
    let collection = cli.collection.as_str();
    let mut reports = Vec::new();

    match &cli.command {
        Command::Migrate => {
            indexer.sink().migrate().await?;
            info!("Migrations applied");
        },
        Command::Directory { paths, nfs_kludge } => {
            let options = CrawlOptions {
                nfs_kludge: *nfs_kludge,
                ..CrawlOptions::default()
            };
            for path in paths {
                let report = indexer
                    .index_directory(path, collection, options, execution)
                    .await?;
                reports.push(report);
            }
        },
        Command::Files { paths } => {
            let report = indexer
                .index_paths(paths.iter().cloned(), collection, execution)
                .await?;
            reports.push(report);
        },
        Command::Filelist { paths } => {
            for path in paths {
                reports.push(indexer.index_file_list(path, collection, execution).await?);
            }
        },
        Command::Meta { paths, data_root } => {
            for path in paths {
                reports.push(
                    indexer
                        .index_meta_file(path, collection, data_root, execution)
                        .await?,
                );
            }
        },
    }

    indexer.sink().pool().close().await;

    let failed: usize = reports.iter().map(BatchReport::failed).sum();
    let indexed: usize = reports.iter().map(|r| r.indexed).sum();
    info!(indexed, failed, dry_run = cli.debug, "Indexing complete");

    if failed > 0 {
        bail!("{} record(s) failed to index", failed);
    }
    Ok(())
}
