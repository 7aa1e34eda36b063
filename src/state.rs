//! Application configuration
//!
//! Environment-driven startup configuration. Operational settings (door
//! count, delays, camera URLs, retention) live in the database and are
//! loaded through [`crate::settings_store::SettingsStore`].

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Database URL (required, no default — credentials are never embedded)
    pub database_url: String,
    /// Root directory for capture/output trees (default: $HOME/PassFlow)
    pub video_root: PathBuf,
    /// Serial port override; when unset the USB-serial bus is scanned
    pub serial_port: Option<String>,
    /// Maximum concurrent segment extractions
    pub extract_jobs: usize,
}

impl AppConfig {
    /// Build configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| Error::Config("DATABASE_URL is not set".to_string()))?;

        let video_root = match std::env::var("PASSFLOW_ROOT") {
            Ok(root) => PathBuf::from(root),
            Err(_) => {
                let home = std::env::var("HOME")
                    .map_err(|_| Error::Config("HOME is not set and no PASSFLOW_ROOT given".to_string()))?;
                PathBuf::from(home).join("PassFlow")
            }
        };

        let extract_jobs = std::env::var("EXTRACT_JOBS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4);

        Ok(Self {
            database_url,
            video_root,
            serial_port: std::env::var("SERIAL_PORT").ok(),
            extract_jobs,
        })
    }
}
