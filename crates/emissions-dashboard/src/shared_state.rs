//! Shared application state
//!
//! One `AppState` is built at startup and cloned into every handler. All
//! members are read-only after construction or internally synchronised.

use std::sync::Arc;
use tracing::info;

use crate::{
    config::Config,
    emissions::{ChartRenderer, EmissionsAggregator, EmissionsSource, JsonChartRenderer},
    page_view_db::PageViewDatabase,
    session::{RandomIdGenerator, SessionCodec, SessionIdGenerator, SessionTracker, TrackedRoutes},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub page_views: Arc<PageViewDatabase>,
    pub tracker: Arc<SessionTracker>,
    pub aggregator: Arc<EmissionsAggregator>,
    pub renderer: Arc<dyn ChartRenderer>,
}

impl AppState {
    pub fn new(config: Config, page_views: Arc<PageViewDatabase>) -> Self {
        Self::with_id_generator(config, page_views, Arc::new(RandomIdGenerator::default()))
    }

    pub fn with_id_generator(
        config: Config,
        page_views: Arc<PageViewDatabase>,
        id_generator: Arc<dyn SessionIdGenerator>,
    ) -> Self {
        info!("Initializing shared application state");

        let tracker = Arc::new(SessionTracker::new(
            SessionCodec::new(&config.session_secret),
            id_generator,
            TrackedRoutes::default(),
            page_views.clone(),
        ));
        let aggregator = Arc::new(EmissionsAggregator::new(EmissionsSource::new(
            config.emissions_db_path.clone(),
        )));

        Self {
            config: Arc::new(config),
            page_views,
            tracker,
            aggregator,
            renderer: Arc::new(JsonChartRenderer),
        }
    }
}
