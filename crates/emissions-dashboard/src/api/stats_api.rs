//! Page-view statistics endpoint

use axum::{extract::State, Json};
use serde::Serialize;

use super::error::ApiError;
use crate::metrics;
use crate::page_view_db::PageDwellSummary;
use crate::shared_state::AppState;

#[derive(Debug, Serialize)]
pub struct PageViewStatsResponse {
    pub total_page_views: i64,
    pub distinct_sessions: i64,
    pub pages: Vec<PageDwellSummary>,
}

pub async fn page_view_stats(
    State(state): State<AppState>,
) -> Result<Json<PageViewStatsResponse>, ApiError> {
    let stats = state.page_views.get_stats()?;
    let pages = state.page_views.page_views.page_dwell_summary()?;

    metrics::inc_request("page_view_stats", "ok");
    Ok(Json(PageViewStatsResponse {
        total_page_views: stats.total_page_views,
        distinct_sessions: stats.distinct_sessions,
        pages,
    }))
}
