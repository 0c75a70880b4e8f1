//! HTTP server startup
//!
//! Opens the page-view store, checks the emissions tables and serves the
//! dashboard. Every route runs inside the page-view tracking middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    api,
    config::Config,
    metrics,
    page_view_db::PageViewDatabase,
    session::track_page_views,
    shared_state::AppState,
};

pub async fn run_server(cfg: Config) -> anyhow::Result<()> {
    crate::telemetry::init_tracing();
    metrics::init_metrics()?;
    cfg.print_config();

    info!("Starting emissions dashboard");

    let page_views = Arc::new(PageViewDatabase::new(&cfg.page_view_db_path)?);
    let state = AppState::new(cfg, page_views);

    // Missing tables or columns abort startup rather than the first dashboard request.
    state.aggregator.source().verify_schema()?;

    let addr = state.config.api_addr()?;
    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let app = build_router(state);
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);
    let timeout = Duration::from_secs(state.config.request_timeout_seconds);

    Router::new()
        .route("/", get(api::home))
        .route("/Access_data", get(api::access_data))
        .route("/Introduction", get(api::introduction))
        .route("/Contact", get(api::contact))
        .route("/api/page-views/stats", get(api::page_view_stats))
        .route("/healthz", get(|| async { "OK" }))
        .route("/metrics", get(metrics::get_metrics))
        .nest_service("/static", static_files)
        .layer(middleware::from_fn_with_state(
            state.tracker.clone(),
            track_page_views,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .with_state(state)
}
