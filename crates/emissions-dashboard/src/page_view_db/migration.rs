//! Versioned schema migrations for the page-view database

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, error, info, warn};

use crate::page_view_db::schema;

struct Migration {
    version: i32,
    name: &'static str,
    sql: &'static str,
}

/// Applied in order; a version number is never reused.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_page_view",
        sql: schema::SCHEMA_SQL,
    },
    Migration {
        version: 2,
        name: "index_page_view",
        sql: schema::INDEX_SQL,
    },
];

const VERSION_TABLE_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    name TEXT,
    applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
";

pub struct MigrationManager<'a> {
    conn: &'a mut Connection,
}

impl<'a> MigrationManager<'a> {
    pub fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    /// Brings the schema up to the latest version. Safe to call on every start.
    pub fn initialize_database(&mut self) -> rusqlite::Result<()> {
        self.conn.execute_batch(VERSION_TABLE_SQL)?;

        let from = self.get_current_version()?;
        let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > from).collect();
        if pending.is_empty() {
            debug!("Page view schema up to date at version {}", from);
            return Ok(());
        }

        info!("Migrating page view schema from version {} ({} pending)", from, pending.len());
        for migration in pending {
            self.apply(migration)?;
        }
        Ok(())
    }

    /// Each migration runs in its own transaction together with its version row.
    fn apply(&mut self, migration: &Migration) -> rusqlite::Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(migration.sql).map_err(|e| {
            error!("Migration {} ({}) failed: {}", migration.version, migration.name, e);
            e
        })?;
        tx.execute(
            "INSERT INTO schema_version (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
        tx.commit()?;
        info!("Applied migration {} ({})", migration.version, migration.name);
        Ok(())
    }

    pub fn get_current_version(&self) -> rusqlite::Result<i32> {
        current_version(&*self.conn)
    }

    pub fn has_migration_applied(&self, version: i32) -> rusqlite::Result<bool> {
        let found: Option<i32> = self
            .conn
            .query_row(
                "SELECT version FROM schema_version WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

/// Highest applied version, 0 before the version table exists.
fn current_version(conn: &Connection) -> rusqlite::Result<i32> {
    match conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<i32>>(0)
    }) {
        Ok(version) => Ok(version.unwrap_or(0)),
        Err(rusqlite::Error::SqliteFailure(_, Some(msg))) if msg.contains("no such table") => Ok(0),
        Err(e) => Err(e),
    }
}

/// Row counts, schema version and file size. A damaged `PageView` table reports
/// zero counts instead of failing the caller.
pub fn get_database_stats(conn: &Connection) -> rusqlite::Result<schema::DatabaseStats> {
    let (total_page_views, distinct_sessions) = conn
        .query_row(
            "SELECT COUNT(*), COUNT(DISTINCT session_id) FROM PageView",
            [],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )
        .unwrap_or_else(|e| {
            warn!("Page view counts unavailable: {}", e);
            (0, 0)
        });

    let page_count: i64 = conn.pragma_query_value(None, "page_count", |row| row.get(0))?;
    let page_size: i64 = conn.pragma_query_value(None, "page_size", |row| row.get(0))?;

    Ok(schema::DatabaseStats {
        total_page_views,
        distinct_sessions,
        schema_version: current_version(conn)?,
        database_size_bytes: page_count * page_size,
    })
}
