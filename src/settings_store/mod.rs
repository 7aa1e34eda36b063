//! SettingsStore - operational configuration snapshot
//!
//! ## Responsibilities
//!
//! - Load door/camera count, recording delays, camera URLs, retention and
//!   replica addresses from the database at startup (fatal on failure)
//! - Serve a cached read-only snapshot to components
//! - Expose an explicit reload entry point for the store's update path —
//!   there is no live polling

mod repository;
mod types;

pub use repository::SettingsRepository;
pub use types::Settings;

use crate::error::Result;
use sqlx::MySqlPool;
use tokio::sync::RwLock;

/// Cached settings with an explicit reload path.
pub struct SettingsStore {
    repo: SettingsRepository,
    cache: RwLock<Settings>,
}

impl SettingsStore {
    /// Connect-and-load; a missing row or query failure aborts startup.
    pub async fn load(pool: MySqlPool) -> Result<Self> {
        let repo = SettingsRepository::new(pool);
        let settings = repo.load_settings().await?;

        tracing::info!(
            doors = settings.doors,
            stop_begin_delay = settings.stop_begin_delay,
            stop_end_delay = settings.stop_end_delay,
            days_before_delete_video = settings.days_before_delete_video,
            replicas = settings.replica_addresses.len(),
            "Settings loaded"
        );
        for (camera, url) in settings.camera_urls.iter().enumerate() {
            if !url.is_empty() {
                tracing::info!(camera, url = %url, "Camera source configured");
            }
        }
        for address in &settings.replica_addresses {
            tracing::info!(address = %address, "Replica store address");
        }

        Ok(Self {
            repo,
            cache: RwLock::new(settings),
        })
    }

    /// Current snapshot.
    pub async fn settings(&self) -> Settings {
        self.cache.read().await.clone()
    }

    /// Settings-update entry point: re-read the store and swap the cache.
    pub async fn reload(&self) -> Result<()> {
        let settings = self.repo.load_settings().await?;
        let mut cache = self.cache.write().await;
        *cache = settings;
        tracing::info!("Settings reloaded");
        Ok(())
    }
}
