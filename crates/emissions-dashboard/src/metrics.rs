use prometheus::{Encoder, TextEncoder, Registry, IntCounter, IntCounterVec, Histogram};
use lazy_static::lazy_static;
use std::sync::OnceLock;
use axum::response::IntoResponse;
use axum::http::StatusCode;
use tracing::error;
lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}
static REQ_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();
static PAGE_VIEWS_LOGGED: OnceLock<IntCounter> = OnceLock::new();
static PAGE_VIEW_FAILURES: OnceLock<IntCounter> = OnceLock::new();
static SESSIONS_ASSIGNED: OnceLock<IntCounter> = OnceLock::new();
static DASHBOARD_BUILD_TIME: OnceLock<Histogram> = OnceLock::new();
pub fn init_metrics() -> prometheus::Result<()> {
    if REQ_COUNTER.get().is_some() {
        return Ok(());
    }

    let req_counter = IntCounterVec::new(
        prometheus::opts!("requests_total", "Total requests per route"),
        &["route", "status"],
    )?;
    let page_views_logged = IntCounter::new(
        "page_views_logged_total",
        "Page view events persisted",
    )?;
    let page_view_failures = IntCounter::new(
        "page_view_log_failures_total",
        "Page view events dropped because the write failed",
    )?;
    let sessions_assigned = IntCounter::new(
        "sessions_assigned_total",
        "Session identifiers handed out on first contact",
    )?;
    let dashboard_build_time = Histogram::with_opts(prometheus::HistogramOpts::new(
        "dashboard_build_seconds",
        "Time spent loading and aggregating emissions data",
    ))?;

    REGISTRY.register(Box::new(req_counter.clone())).ok();
    REGISTRY.register(Box::new(page_views_logged.clone())).ok();
    REGISTRY.register(Box::new(page_view_failures.clone())).ok();
    REGISTRY.register(Box::new(sessions_assigned.clone())).ok();
    REGISTRY.register(Box::new(dashboard_build_time.clone())).ok();

    let _ = REQ_COUNTER.set(req_counter);
    let _ = PAGE_VIEWS_LOGGED.set(page_views_logged);
    let _ = PAGE_VIEW_FAILURES.set(page_view_failures);
    let _ = SESSIONS_ASSIGNED.set(sessions_assigned);
    let _ = DASHBOARD_BUILD_TIME.set(dashboard_build_time);
    Ok(())
}
pub fn inc_request(route: &str, status: &str) {
    if let Some(counter) = REQ_COUNTER.get() {
        counter.with_label_values(&[route, status]).inc();
    }
}
pub fn inc_page_views_logged() {
    if let Some(counter) = PAGE_VIEWS_LOGGED.get() {
        counter.inc();
    }
}
pub fn inc_page_view_failures() {
    if let Some(counter) = PAGE_VIEW_FAILURES.get() {
        counter.inc();
    }
}
pub fn inc_sessions_assigned() {
    if let Some(counter) = SESSIONS_ASSIGNED.get() {
        counter.inc();
    }
}
pub fn observe_dashboard_build(duration: f64) {
    if let Some(histogram) = DASHBOARD_BUILD_TIME.get() {
        histogram.observe(duration);
    }
}
pub async fn get_metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            b"metrics encoding failed".to_vec(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        buffer,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_metrics_exposes_registered_counters() {
        init_metrics().unwrap();
        init_metrics().unwrap();
        inc_request("home", "ok");
        inc_page_views_logged();

        let response = get_metrics().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("requests_total"));
        assert!(text.contains("page_views_logged_total"));
    }
}
