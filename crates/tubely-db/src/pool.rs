//! Connection pool management.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::time::Duration;
use tubely_common::{Error, Result};

use crate::migrations;

pub type DbPool = Pool<SqliteConnectionManager>;

pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const POOL_SIZE: u32 = 4;

fn build(manager: SqliteConnectionManager) -> Result<DbPool> {
    let manager = manager.with_init(|conn| {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
    });

    let pool = Pool::builder()
        .max_size(POOL_SIZE)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create connection pool: {}", e)))?;

    let conn = get_conn(&pool)?;
    migrations::run_migrations(&conn)
        .map_err(|e| Error::database(format!("Failed to run migrations: {}", e)))?;

    Ok(pool)
}

/// Open (creating if needed) the SQLite file at `db_path` and migrate it.
///
/// ```no_run
/// use tubely_db::pool::init_pool;
///
/// let pool = init_pool("/var/lib/tubely/tubely.db").unwrap();
/// ```
pub fn init_pool(db_path: &str) -> Result<DbPool> {
    if let Some(parent) = std::path::Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    build(SqliteConnectionManager::file(db_path))
}

/// In-memory database for tests.
///
/// Every pooled connection opens the same named shared-cache database, so
/// rows written through one connection are visible through the others. The
/// data is gone once the pool is dropped.
pub fn init_memory_pool() -> Result<DbPool> {
    let uri = format!("file:tubely-{}?mode=memory&cache=shared", uuid::Uuid::new_v4());
    build(SqliteConnectionManager::file(uri))
}

pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("Failed to get connection from pool: {}", e)))
}
