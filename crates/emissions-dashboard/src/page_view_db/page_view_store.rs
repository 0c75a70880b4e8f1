use crate::page_view_db::schema::*;
use rusqlite::{params, Row};
use chrono::{DateTime, NaiveDateTime, Utc};
use anyhow::Context;
use tracing::{debug, warn};
use std::sync::Arc;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

/// Append-only access to the `PageView` table.
pub struct PageViewStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl PageViewStore {
    pub fn new(pool: Arc<Pool<SqliteConnectionManager>>) -> Self {
        Self { pool }
    }

    fn get_conn(&self) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().context("No page view connection available")
    }

    /// Persist one page transition, stamped with `written_at`.
    pub fn record_page_view(
        &self,
        session_id: i64,
        page: &str,
        time_spent: f64,
        written_at: DateTime<Utc>,
    ) -> anyhow::Result<PageViewEvent> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO PageView (session_id, page, time_spent, start_time) VALUES (?1, ?2, ?3, ?4)",
            params![session_id, page, time_spent, written_at.to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();

        debug!("Logged page view {} for session {}: {} ({:.3}s)", id, session_id, page, time_spent);
        Ok(PageViewEvent {
            id,
            session_id,
            page: page.to_string(),
            time_spent,
            start_time: written_at,
        })
    }

    pub fn session_page_views(&self, session_id: i64) -> anyhow::Result<Vec<PageViewEvent>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, session_id, page, time_spent, start_time
             FROM PageView WHERE session_id = ?1 ORDER BY id",
        )?;
        let mut rows = stmt.query([session_id])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(Self::row_to_event(row)?);
        }
        Ok(events)
    }

    pub fn total_page_views(&self) -> anyhow::Result<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM PageView", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Per-page view counts and dwell totals, busiest page first.
    pub fn page_dwell_summary(&self) -> anyhow::Result<Vec<PageDwellSummary>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT page, COUNT(*), COALESCE(SUM(time_spent), 0.0), COALESCE(AVG(time_spent), 0.0)
             FROM PageView GROUP BY page ORDER BY COUNT(*) DESC, page ASC",
        )?;
        let summaries = stmt
            .query_map([], |row| {
                Ok(PageDwellSummary {
                    page: row.get(0)?,
                    views: row.get(1)?,
                    total_seconds: row.get(2)?,
                    mean_seconds: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(summaries)
    }

    /// RFC 3339 as written by this store, or the naive `YYYY-MM-DD HH:MM:SS[.f]`
    /// form SQLite's `CURRENT_TIMESTAMP` produces, read as UTC.
    fn parse_datetime_safe(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|naive| naive.and_utc())
    }

    fn row_to_event(row: &Row) -> anyhow::Result<PageViewEvent> {
        let start_time = row
            .get::<_, Option<String>>(4)?
            .as_deref()
            .and_then(Self::parse_datetime_safe)
            .unwrap_or_else(|| {
                warn!("Unparseable page view start_time; using the epoch");
                DateTime::<Utc>::UNIX_EPOCH
            });

        Ok(PageViewEvent {
            id: row.get(0)?,
            session_id: row.get(1)?,
            page: row.get(2)?,
            time_spent: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
            start_time,
        })
    }
}
