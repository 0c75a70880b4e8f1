//! API module - HTTP handlers for the dashboard pages and page-view statistics

pub mod error;
pub mod pages;
pub mod stats_api;

pub use error::ApiError;
pub use pages::{access_data, contact, home, introduction};
pub use stats_api::{page_view_stats, PageViewStatsResponse};
