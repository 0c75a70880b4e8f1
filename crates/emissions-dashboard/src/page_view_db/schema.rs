//! Database schema definitions for the page-view log
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// One tracked page transition. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageViewEvent {
    pub id: i64,
    pub session_id: i64,
    pub page: String,
    pub time_spent: f64,
    pub start_time: DateTime<Utc>,
}

/// Dwell totals for a single page label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageDwellSummary {
    pub page: String,
    pub views: i64,
    pub total_seconds: f64,
    pub mean_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub total_page_views: i64,
    pub distinct_sessions: i64,
    pub schema_version: i32,
    pub database_size_bytes: i64,
}

pub const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS PageView (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL,
    page TEXT NOT NULL,
    time_spent REAL,
    start_time TEXT
);
";

pub const INDEX_SQL: &str = "
CREATE INDEX IF NOT EXISTS idx_pageview_session ON PageView (session_id);
CREATE INDEX IF NOT EXISTS idx_pageview_page ON PageView (page);
";
