// emissions-dashboard/crates/emissions-dashboard/src/config.rs

use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Minimum accepted length of the cookie signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 16;

#[derive(Clone)]
pub struct Config {
    pub api_host: String,
    pub api_port: u16,
    pub session_secret: String,
    pub base_dir: PathBuf,
    pub page_view_db_path: PathBuf,
    pub emissions_db_path: PathBuf,
    pub static_dir: PathBuf,
    pub choropleth_quarter: String,
    pub request_timeout_seconds: u64,
}

// The secret never reaches logs, even through {:?}.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_host", &self.api_host)
            .field("api_port", &self.api_port)
            .field("session_secret", &"<redacted>")
            .field("base_dir", &self.base_dir)
            .field("page_view_db_path", &self.page_view_db_path)
            .field("emissions_db_path", &self.emissions_db_path)
            .field("static_dir", &self.static_dir)
            .field("choropleth_quarter", &self.choropleth_quarter)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        #[cfg(feature = "cli")]
        {
            if let Err(e) = dotenvy::dotenv() {
                warn!("Failed to load .env file: {}. Using system environment variables.", e);
            } else {
                info!("Loaded environment variables from .env file");
            }
        }

        let session_secret = env::var("SESSION_SECRET")
            .context("SESSION_SECRET environment variable not set. Please set it in your .env file")?;
        Self::validate_secret(&session_secret)?;

        let base_dir = match env::var("BASE_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => Self::executable_dir(),
        };

        let page_view_db_path = Self::path_or(&base_dir, "PAGE_VIEW_DB_PATH", "test.db");
        let emissions_db_path = Self::path_or(&base_dir, "EMISSIONS_DB_PATH", "cleaned_data.db");
        let static_dir = Self::path_or(&base_dir, "STATIC_DIR", "static");

        if !emissions_db_path.exists() {
            warn!(
                "Emissions database not found at {}; the dashboard page will fail until it exists",
                emissions_db_path.display()
            );
        }

        Ok(Self {
            api_host: env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "5000".into())
                .parse()
                .context("API_PORT must be a valid port number")?,
            session_secret,
            base_dir,
            page_view_db_path,
            emissions_db_path,
            static_dir,
            choropleth_quarter: env::var("CHOROPLETH_QUARTER").unwrap_or_else(|_| "2024Q2".into()),
            request_timeout_seconds: env::var("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .context("REQUEST_TIMEOUT_SECONDS must be a whole number of seconds")?,
        })
    }

    fn validate_secret(secret: &str) -> Result<()> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "SESSION_SECRET must be at least {} bytes long (got {})",
                MIN_SECRET_LEN,
                secret.len()
            ));
        }
        Ok(())
    }

    /// Directory holding the running executable, falling back to the working directory.
    fn executable_dir() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_default())
    }

    fn path_or(base_dir: &Path, var: &str, default_name: &str) -> PathBuf {
        match env::var(var) {
            Ok(value) => {
                let path = PathBuf::from(value);
                if path.is_absolute() {
                    path
                } else {
                    base_dir.join(path)
                }
            }
            Err(_) => base_dir.join(default_name),
        }
    }

    pub fn print_config(&self) {
        info!("Current Configuration:");
        info!("- API: {}:{}", self.api_host, self.api_port);
        info!("- Base Dir: {}", self.base_dir.display());
        info!("- Page View DB: {}", self.page_view_db_path.display());
        info!("- Emissions DB: {}", self.emissions_db_path.display());
        info!("- Static Dir: {}", self.static_dir.display());
        info!("- Choropleth Quarter: {}", self.choropleth_quarter);
        info!("- Request Timeout: {}s", self.request_timeout_seconds);
    }

    pub fn api_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.api_host, self.api_port)
            .parse()
            .with_context(|| format!("Invalid API address {}:{}", self.api_host, self.api_port))
    }
}

#[cfg(test)]
pub(crate) fn test_config(dir: &Path) -> Config {
    Config {
        api_host: "127.0.0.1".to_string(),
        api_port: 5000,
        session_secret: "test-secret-0123456789abcdef".to_string(),
        base_dir: dir.to_path_buf(),
        page_view_db_path: dir.join("test.db"),
        emissions_db_path: dir.join("cleaned_data.db"),
        static_dir: dir.join("static"),
        choropleth_quarter: "2024Q2".to_string(),
        request_timeout_seconds: 60,
    }
}
