// emissions-dashboard/crates/emissions-dashboard/src/main.rs

#[cfg(feature = "cli")]
use emissions_dashboard::{config::Config, run_server};

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::from_env()?;

    println!("Starting emissions dashboard on {}:{}", cfg.api_host, cfg.api_port);
    run_server(cfg).await
}

#[cfg(not(feature = "cli"))]
fn main() {
    println!("CLI feature not enabled. Enable with --features cli");
}
