//! Database Layer with Connection Pooling
//!
//! SQLite database layer featuring:
//! - Connection pooling via r2d2 for concurrent access
//! - WAL mode for optimal read/write performance
//! - Idempotent schema initialization

use std::path::Path;
use std::sync::Arc;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::types::{Result, ResultExt, WallError};

/// Shared database handle for async contexts.
pub type SharedDatabase = Arc<Database>;

const SCHEMA: &str = include_str!("schema.sql");

/// Current schema version for migration tracking
const SCHEMA_VERSION: u32 = 1;

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 8,
            connection_timeout_secs: 30,
        }
    }
}

/// Thread-safe database with connection pooling.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open database with connection pooling at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, PoolConfig::default())
    }

    /// Open database with custom pool configuration.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(std::time::Duration::from_secs(
                config.connection_timeout_secs,
            ))
            .build(manager)
            .map_err(|e| WallError::Storage(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.initialize()?;
        Ok(db)
    }

    /// Open an in-memory database for testing or temporary use.
    ///
    /// Pool size is pinned to 1: each in-memory connection is its own
    /// database, so pooling more would split the data.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| WallError::Storage(format!("Failed to create in-memory pool: {}", e)))?;

        let db = Self { pool };
        db.initialize()?;
        Ok(db)
    }

    /// Configure a new connection with production-ready settings.
    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            "#,
        )?;
        Ok(())
    }

    /// Get a connection from the pool.
    pub(crate) fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            WallError::Storage(format!("Failed to acquire database connection: {}", e))
        })
    }

    /// Initialize database schema.
    fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)
            .with_context("Failed to initialize database schema")?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .with_context("Failed to set schema version")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_initializes_schema() {
        let db = Database::open_in_memory().expect("open");
        let conn = db.conn().expect("conn");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM words", [], |row| row.get(0))
            .expect("query");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_open_on_disk_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("words.db");

        {
            let db = Database::open(&path).expect("first open");
            let conn = db.conn().expect("conn");
            conn.execute(
                "INSERT INTO words (word, created_at, updated_at) VALUES ('apple', '', '')",
                [],
            )
            .expect("insert");
        }

        // Re-opening must not clobber existing rows
        let db = Database::open(&path).expect("second open");
        let conn = db.conn().expect("conn");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM words", [], |row| row.get(0))
            .expect("query");
        assert_eq!(count, 1);
    }
}
