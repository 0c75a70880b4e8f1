//! Page-view database - SQLite log of how long each session stayed on each page
pub mod migration;
pub mod page_view_store;
pub mod schema;

pub use migration::MigrationManager;
pub use page_view_store::PageViewStore;
pub use schema::*;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use tracing::{info, warn};

type SqlitePool = Pool<SqliteConnectionManager>;

const FILE_POOL_SIZE: u32 = 4;

const FILE_PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA busy_timeout = 5000;
";

pub struct PageViewDatabase {
    pub page_views: PageViewStore,
    pool: Arc<SqlitePool>,
}

impl PageViewDatabase {
    /// Opens (creating if needed) the database file and migrates it.
    pub fn new(db_path: &Path) -> anyhow::Result<Self> {
        info!("Opening page view database at {}", db_path.display());
        if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_flags(
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
            )
            .with_init(|conn| conn.execute_batch(FILE_PRAGMAS));
        let pool = Pool::builder()
            .max_size(FILE_POOL_SIZE)
            .build(manager)
            .with_context(|| format!("Failed to open page view pool for {}", db_path.display()))?;

        Self::from_pool(pool)
    }

    /// Every pooled connection to `:memory:` is its own database, so the pool holds one.
    pub fn new_in_memory() -> anyhow::Result<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())?;
        Self::from_pool(pool)
    }

    fn from_pool(pool: SqlitePool) -> anyhow::Result<Self> {
        {
            let mut conn = pool.get()?;
            MigrationManager::new(&mut conn)
                .initialize_database()
                .context("Page view schema migration failed")?;
        }
        let pool = Arc::new(pool);
        Ok(Self {
            page_views: PageViewStore::new(Arc::clone(&pool)),
            pool,
        })
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    pub fn get_stats(&self) -> anyhow::Result<DatabaseStats> {
        let conn = self.pool.get()?;
        Ok(migration::get_database_stats(&conn)?)
    }
}

impl Drop for PageViewDatabase {
    fn drop(&mut self) {
        // Fold the WAL back into the main file so the database is a single file at rest.
        if let Ok(conn) = self.pool.get() {
            if let Err(e) = conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);") {
                warn!("WAL checkpoint on close failed: {}", e);
            }
        }
    }
}
