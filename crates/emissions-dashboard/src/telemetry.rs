// emissions-dashboard/crates/emissions-dashboard/src/telemetry.rs

use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset. Request traces from tower-http are kept at debug.
const DEFAULT_FILTER: &str = "info,tower_http=debug";

pub fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.into());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_level(true)
        .compact()
        .finish();

    // A second call (tests, embedding) keeps the first subscriber.
    let _ = tracing::subscriber::set_global_default(subscriber);
}
