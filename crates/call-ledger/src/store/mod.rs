//! Call persistence (sqlx / SQLite).
//!
//! The store is deliberately dumb: row access plus the compare-and-set
//! update the ledger builds its linearized transitions on. Legality checks
//! and feed publication live in [`crate::ledger`].

pub mod calls;
pub mod schema;

use anyhow::Result;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::info;

/// Handle to the calls table.
#[derive(Debug, Clone)]
pub struct CallStore {
    pool: SqlitePool,
}

impl CallStore {
    /// Wrap an existing pool and ensure the schema exists.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        schema::create_calls_table(&pool).await?;
        Ok(Self { pool })
    }

    /// Connect to a database URL and ensure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = connect_pool(database_url).await?;
        Self::new(pool).await
    }

    /// Private in-memory database, primarily for tests.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// The underlying pool, shared with sibling stores (recordings).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Open a pool against `database_url`.
///
/// A single connection is enough for the voice core's write rate and keeps
/// an `sqlite::memory:` database coherent across tasks.
pub async fn connect_pool(database_url: &str) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(database_url)
        .await?;
    info!("Connected call store at {}", database_url);
    Ok(pool)
}
