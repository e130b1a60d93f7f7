//! Bounded PostGIS session pool
//!
//! A pool of capacity N owns exactly N tokens for its whole lifetime. A
//! [`Session`] holds one token and one pooled connection; dropping the
//! session returns both, whichever way the unit of work ends. Acquiring
//! waits for a free token without a deadline, which is what throttles
//! workers when the database is the bottleneck.

use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::Postgres;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::error::{IndexError, IndexResult};

/// Fixed set of capacity tokens
#[derive(Debug, Clone)]
pub struct Tokens {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl Tokens {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait until a token is free and take it
    pub async fn take(&self) -> IndexResult<Token> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| IndexError::Closed("connection pool"))?;
        Ok(Token { _permit: permit })
    }

    /// Total number of tokens
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tokens not currently held
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Tokens currently held by units of work
    pub fn outstanding(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }
}

/// One unit of pool capacity, returned on drop
#[derive(Debug)]
pub struct Token {
    _permit: OwnedSemaphorePermit,
}

/// Connection pool capped at the configured number of sessions
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    pg: PgPool,
    tokens: Tokens,
}

impl ConnectionPool {
    /// Open the pool and verify the store answers before handing out tokens
    pub async fn connect(config: &DatabaseConfig) -> IndexResult<Self> {
        config.validate()?;

        let pg = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(0)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_with(config.connect_options())
            .await?;

        health_check(&pg).await?;

        info!(
            host = %config.host,
            port = config.port,
            database = %config.dbname,
            max_connections = config.max_connections,
            "Database connection pool created"
        );

        Ok(Self::from_pool(pg, config.max_connections as usize))
    }

    /// Wrap an existing sqlx pool; `capacity` should not exceed its maximum size
    pub fn from_pool(pg: PgPool, capacity: usize) -> Self {
        Self {
            pg,
            tokens: Tokens::new(capacity),
        }
    }

    /// Take a token, then a connection
    pub async fn acquire(&self) -> IndexResult<Session> {
        let token = self.tokens.take().await?;
        // a failed acquire drops the token, returning it to the pool
        let conn = self.pg.acquire().await?;
        debug!(outstanding = self.tokens.outstanding(), "Session acquired");
        Ok(Session { conn, _token: token })
    }

    pub fn tokens(&self) -> &Tokens {
        &self.tokens
    }

    /// The underlying pool, for work outside the token discipline (migrations)
    pub fn pg(&self) -> &PgPool {
        &self.pg
    }

    pub async fn close(&self) {
        self.pg.close().await;
    }
}

/// A scoped database session
pub struct Session {
    conn: PoolConnection<Postgres>,
    _token: Token,
}

impl Deref for Session {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

pub async fn health_check(pool: &PgPool) -> IndexResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(IndexError::from)
}
