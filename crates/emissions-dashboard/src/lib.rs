// emissions-dashboard/crates/emissions-dashboard/src/lib.rs

pub mod api;
pub mod config;
pub mod emissions;
pub mod metrics;
pub mod page_view_db;
pub mod server;
pub mod session;
pub mod shared_state;
pub mod telemetry;

// Public API exports
pub use config::Config;
pub use emissions::{DashboardData, EmissionsAggregator, EmissionsSource};
pub use page_view_db::PageViewDatabase;
pub use server::{build_router, run_server};
pub use session::{SessionTracker, TrackedRoutes};
pub use shared_state::AppState;
