//! Page dwell tracking.
//!
//! The pre-hook gives every visitor a session on first contact. The post-hook,
//! on tracked routes only, logs how long the visitor stayed on the page they
//! were on and then moves them to the current page.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use super::cookie::SessionCodec;
use super::id_gen::SessionIdGenerator;
use super::state::{SessionContext, SessionCookie, SessionState};
use crate::metrics;
use crate::page_view_db::{PageViewDatabase, PageViewEvent};

/// Route path to the label stored in `PageView.page`.
#[derive(Debug, Clone)]
pub struct TrackedRoutes {
    routes: Vec<(String, String)>,
}

impl TrackedRoutes {
    pub fn new<I, P, L>(routes: I) -> Self
    where
        I: IntoIterator<Item = (P, L)>,
        P: Into<String>,
        L: Into<String>,
    {
        Self {
            routes: routes.into_iter().map(|(p, l)| (p.into(), l.into())).collect(),
        }
    }

    pub fn label(&self, path: &str) -> Option<&str> {
        self.routes
            .iter()
            .find(|(route, _)| route == path)
            .map(|(_, label)| label.as_str())
    }
}

impl Default for TrackedRoutes {
    fn default() -> Self {
        Self::new([
            ("/", "Home"),
            ("/Access_data", "Access_data"),
            ("/Introduction", "Introduction"),
            ("/Contact", "Contact"),
        ])
    }
}

pub struct SessionTracker {
    codec: SessionCodec,
    id_generator: Arc<dyn SessionIdGenerator>,
    routes: TrackedRoutes,
    database: Arc<PageViewDatabase>,
}

impl SessionTracker {
    pub fn new(
        codec: SessionCodec,
        id_generator: Arc<dyn SessionIdGenerator>,
        routes: TrackedRoutes,
        database: Arc<PageViewDatabase>,
    ) -> Self {
        Self {
            codec,
            id_generator,
            routes,
            database,
        }
    }

    pub fn codec(&self) -> &SessionCodec {
        &self.codec
    }

    pub fn routes(&self) -> &TrackedRoutes {
        &self.routes
    }

    /// Pre-hook. Assigns identity only when the request carries none.
    ///
    /// A session first seen on an untracked path gets an id but no page yet,
    /// so its first tracked request has nothing to close out.
    pub fn begin_request(
        &self,
        incoming: Option<SessionCookie>,
        path: &str,
        now: DateTime<Utc>,
    ) -> SessionContext {
        match incoming {
            Some(cookie) if cookie.id.is_some() => SessionContext::existing(cookie),
            _ => {
                let id = self.id_generator.next_id();
                metrics::inc_sessions_assigned();
                debug!("Assigned session {} on {}", id, path);
                let cookie = if self.routes.label(path).is_some() {
                    SessionCookie::assigned(id, now, path)
                } else {
                    SessionCookie::identity_only(id)
                };
                SessionContext::fresh(cookie)
            }
        }
    }

    /// Post-hook. Returns the event written, if any. Write failures are logged
    /// and swallowed.
    pub fn finish_request(
        &self,
        ctx: &SessionContext,
        path: &str,
        now: DateTime<Utc>,
    ) -> Option<PageViewEvent> {
        let label = self.routes.label(path)?;

        // A session assigned by this very request has no prior page to close out.
        let event = if ctx.is_fresh() {
            None
        } else {
            match ctx.state() {
                Some(state) => self.log_page_view(&state, now),
                None => {
                    debug!("Session state incomplete on {}; skipping page view", path);
                    None
                }
            }
        };

        ctx.write(|cookie| {
            cookie.start_time = Some(now);
            cookie.previous_path = Some(label.to_string());
        });

        event
    }

    fn log_page_view(&self, state: &SessionState, now: DateTime<Utc>) -> Option<PageViewEvent> {
        let time_spent = dwell_seconds(state.start_time, now);
        match self
            .database
            .page_views
            .record_page_view(state.id, &state.previous_path, time_spent, now)
        {
            Ok(event) => {
                metrics::inc_page_views_logged();
                Some(event)
            }
            Err(e) => {
                metrics::inc_page_view_failures();
                error!("Error logging page view: {}", e);
                None
            }
        }
    }
}

/// Seconds between `start` and `now`. A start in the future counts as zero.
pub fn dwell_seconds(start: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let elapsed = (now - start).num_microseconds().unwrap_or(i64::MAX) as f64 / 1_000_000.0;
    elapsed.max(0.0)
}

/// Middleware wrapping every route with the pre/post hooks.
pub async fn track_page_views(
    State(tracker): State<Arc<SessionTracker>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let incoming = tracker.codec.from_headers(request.headers());
    let ctx = tracker.begin_request(incoming, &path, Utc::now());
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;

    tracker.finish_request(&ctx, &path, Utc::now());

    if ctx.is_dirty() {
        match tracker.codec.set_cookie_header(&ctx.snapshot()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => warn!("Failed to encode session cookie: {}", e),
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::id_gen::SequentialIdGenerator;
    use axum::body::Body;
    use axum::http::{HeaderValue, StatusCode};
    use axum::routing::get;
    use axum::{Extension, Router};
    use chrono::Duration;
    use proptest::prelude::*;
    use tower::ServiceExt;

    const SECRET: &str = "test-secret-0123456789abcdef";

    fn tracker_with(database: Arc<PageViewDatabase>) -> SessionTracker {
        SessionTracker::new(
            SessionCodec::new(SECRET),
            Arc::new(SequentialIdGenerator::starting_at(1_000_000)),
            TrackedRoutes::default(),
            database,
        )
    }

    /// Carries the session across requests the way a browser would.
    fn visit(
        tracker: &SessionTracker,
        jar: Option<String>,
        path: &str,
        now: DateTime<Utc>,
    ) -> (String, Option<PageViewEvent>) {
        let incoming = jar.and_then(|value| tracker.codec().decode(&value));
        let ctx = tracker.begin_request(incoming, path, now);
        let event = tracker.finish_request(&ctx, path, now);
        (tracker.codec().encode(&ctx.snapshot()).unwrap(), event)
    }

    #[test]
    fn test_first_request_assigns_without_logging() {
        let db = Arc::new(PageViewDatabase::new_in_memory().unwrap());
        let tracker = tracker_with(db.clone());
        let now = Utc::now();

        let ctx = tracker.begin_request(None, "/", now);
        assert!(ctx.is_fresh());
        assert_eq!(ctx.session_id(), Some(1_000_000));

        assert!(tracker.finish_request(&ctx, "/", now).is_none());
        assert_eq!(db.page_views.total_page_views().unwrap(), 0);
        assert_eq!(ctx.state().unwrap().previous_path, "Home");
    }

    #[test]
    fn test_existing_identity_is_kept() {
        let db = Arc::new(PageViewDatabase::new_in_memory().unwrap());
        let tracker = tracker_with(db);
        let cookie = SessionCookie::assigned(2_222_222, Utc::now(), "Home");

        let ctx = tracker.begin_request(Some(cookie.clone()), "/Contact", Utc::now());
        assert!(!ctx.is_fresh());
        assert_eq!(ctx.snapshot(), cookie);
    }

    #[test]
    fn test_transition_logs_previous_page_with_dwell() {
        let db = Arc::new(PageViewDatabase::new_in_memory().unwrap());
        let tracker = tracker_with(db.clone());
        let t0 = Utc::now();

        let (jar, _) = visit(&tracker, None, "/", t0);
        let (_, event) = visit(&tracker, Some(jar), "/Introduction", t0 + Duration::seconds(42));

        let event = event.expect("second tracked request logs");
        assert_eq!(event.session_id, 1_000_000);
        assert_eq!(event.page, "Home");
        assert_eq!(event.time_spent, 42.0);
    }

    #[test]
    fn test_untracked_path_neither_logs_nor_moves() {
        let db = Arc::new(PageViewDatabase::new_in_memory().unwrap());
        let tracker = tracker_with(db.clone());
        let t0 = Utc::now();

        let (jar, _) = visit(&tracker, None, "/", t0);
        let ctx = tracker.begin_request(tracker.codec().decode(&jar), "/static/emissions_bar.json", t0);
        assert!(tracker.finish_request(&ctx, "/static/emissions_bar.json", t0).is_none());
        assert!(!ctx.is_dirty());
        assert_eq!(ctx.state().unwrap().previous_path, "Home");
    }

    #[test]
    fn test_session_first_seen_on_untracked_path_logs_nothing_on_first_page() {
        let db = Arc::new(PageViewDatabase::new_in_memory().unwrap());
        let tracker = tracker_with(db.clone());
        let t0 = Utc::now();

        let ctx = tracker.begin_request(None, "/static/emissions_bar.json", t0);
        assert!(tracker.finish_request(&ctx, "/static/emissions_bar.json", t0).is_none());
        assert_eq!(ctx.session_id(), Some(1_000_000));
        assert!(ctx.state().is_none());
        let jar = tracker.codec().encode(&ctx.snapshot()).unwrap();

        let (jar, event) = visit(&tracker, Some(jar), "/", t0 + Duration::seconds(3));
        assert!(event.is_none());
        assert_eq!(db.page_views.total_page_views().unwrap(), 0);

        let (_, event) = visit(&tracker, Some(jar), "/Contact", t0 + Duration::seconds(10));
        let event = event.expect("second tracked request logs");
        assert_eq!(event.session_id, 1_000_000);
        assert_eq!(event.page, "Home");
        assert_eq!(event.time_spent, 7.0);
    }

    #[test]
    fn test_incomplete_state_skips_logging_and_repairs() {
        let db = Arc::new(PageViewDatabase::new_in_memory().unwrap());
        let tracker = tracker_with(db.clone());
        let partial = SessionCookie {
            id: Some(3_333_333),
            start_time: None,
            previous_path: Some("Home".to_string()),
        };

        let ctx = tracker.begin_request(Some(partial), "/Contact", Utc::now());
        assert!(tracker.finish_request(&ctx, "/Contact", Utc::now()).is_none());
        assert_eq!(db.page_views.total_page_views().unwrap(), 0);

        let repaired = ctx.state().unwrap();
        assert_eq!(repaired.id, 3_333_333);
        assert_eq!(repaired.previous_path, "Contact");
    }

    #[test]
    fn test_clock_skew_clamps_to_zero() {
        let now = Utc::now();
        assert_eq!(dwell_seconds(now + Duration::seconds(5), now), 0.0);
        assert_eq!(dwell_seconds(now - Duration::milliseconds(1500), now), 1.5);
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let db = Arc::new(PageViewDatabase::new_in_memory().unwrap());
        {
            let conn = db.connection().unwrap();
            conn.execute_batch("DROP TABLE PageView;").unwrap();
        }
        let tracker = tracker_with(db);
        let t0 = Utc::now();

        let (jar, _) = visit(&tracker, None, "/", t0);
        let ctx = tracker.begin_request(tracker.codec().decode(&jar), "/Contact", t0);
        assert!(tracker.finish_request(&ctx, "/Contact", t0).is_none());
        // The session still advances.
        assert_eq!(ctx.state().unwrap().previous_path, "Contact");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_n_tracked_requests_log_n_minus_one(
            paths in prop::collection::vec(
                prop::sample::select(vec![
                    "/",
                    "/Access_data",
                    "/Introduction",
                    "/Contact",
                    "/static/emissions_bar.json",
                    "/healthz",
                    "/metrics",
                    "/no-such-page",
                ]),
                1..20,
            ),
            gaps in prop::collection::vec(0i64..600, 20),
        ) {
            let db = Arc::new(PageViewDatabase::new_in_memory().unwrap());
            let tracker = tracker_with(db.clone());
            let mut now = Utc::now();
            let mut jar = None;

            for (path, gap) in paths.iter().zip(gaps.iter()) {
                now += Duration::seconds(*gap);
                let (next_jar, _) = visit(&tracker, jar, path, now);
                jar = Some(next_jar);
            }

            let labels: Vec<&str> = paths
                .iter()
                .filter_map(|path| tracker.routes().label(path))
                .collect();
            let events = db.page_views.session_page_views(1_000_000).unwrap();
            prop_assert_eq!(events.len(), labels.len().saturating_sub(1));
            prop_assert!(events.iter().all(|e| e.time_spent >= 0.0));
            for (event, label) in events.iter().zip(labels.iter()) {
                prop_assert_eq!(event.page.as_str(), *label);
            }
        }
    }

    // ===== Middleware Tests =====

    async fn echo_session(Extension(ctx): Extension<SessionContext>) -> String {
        ctx.session_id().map(|id| id.to_string()).unwrap_or_default()
    }

    fn app(tracker: Arc<SessionTracker>) -> Router {
        Router::new()
            .route("/", get(echo_session))
            .route("/Contact", get(echo_session))
            .route("/healthz", get(|| async { "OK" }))
            .layer(axum::middleware::from_fn_with_state(tracker, track_page_views))
    }

    fn session_cookie(response: &Response) -> Option<HeaderValue> {
        let raw = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
        let pair = raw.split(';').next()?;
        HeaderValue::from_str(pair).ok()
    }

    #[tokio::test]
    async fn test_middleware_round_trip() {
        let db = Arc::new(PageViewDatabase::new_in_memory().unwrap());
        let tracker = Arc::new(tracker_with(db.clone()));

        let first = app(tracker.clone())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let cookie = session_cookie(&first).expect("first response sets the session cookie");
        assert_eq!(db.page_views.total_page_views().unwrap(), 0);

        let second = app(tracker.clone())
            .oneshot(
                Request::builder()
                    .uri("/Contact")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = axum::body::to_bytes(second.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"1000000");

        let events = db.page_views.session_page_views(1_000_000).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].page, "Home");
    }

    #[tokio::test]
    async fn test_forged_cookie_gets_fresh_session() {
        let db = Arc::new(PageViewDatabase::new_in_memory().unwrap());
        let tracker = Arc::new(tracker_with(db.clone()));

        let response = app(tracker)
            .oneshot(
                Request::builder()
                    .uri("/Contact")
                    .header(header::COOKIE, "session=eyJpZCI6MX0.00")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(session_cookie(&response).is_some());
        assert_eq!(db.page_views.total_page_views().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_untracked_route_with_session_sets_no_cookie() {
        let db = Arc::new(PageViewDatabase::new_in_memory().unwrap());
        let tracker = Arc::new(tracker_with(db));
        let value = tracker
            .codec()
            .encode(&SessionCookie::assigned(1_000_000, Utc::now(), "Home"))
            .unwrap();

        let response = app(tracker)
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .header(header::COOKIE, format!("session={}", value))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }
}
