//! SettingsStore repository
//!
//! Database access for the `settings` and `remoteDB` tables. Column names
//! follow the store's schema as deployed (including the historical
//! `daysBeforeDeliteVideo` spelling).

use super::types::Settings;
use crate::error::{Error, Result};
use sqlx::{MySqlPool, Row};

#[derive(Clone)]
pub struct SettingsRepository {
    pool: MySqlPool,
}

impl SettingsRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Load the settings row plus replica addresses.
    ///
    /// A missing settings row is a startup-fatal configuration error;
    /// individual NULL columns fall back to defaults.
    pub async fn load_settings(&self) -> Result<Settings> {
        let row = sqlx::query(
            "SELECT doors, stopBeginDelay, stopEndDelay, daysBeforeDeliteVideo, \
             cam0_string, cam1_string FROM settings LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::Config("no settings row in database".to_string()))?;

        let defaults = Settings::default();

        let doors: Option<i32> = row.try_get("doors")?;
        let stop_begin_delay: Option<i32> = row.try_get("stopBeginDelay")?;
        let stop_end_delay: Option<i32> = row.try_get("stopEndDelay")?;
        let retention: Option<i32> = row.try_get("daysBeforeDeliteVideo")?;
        let cam0: Option<String> = row.try_get("cam0_string")?;
        let cam1: Option<String> = row.try_get("cam1_string")?;

        let settings = Settings {
            doors: doors.map(|d| d.max(0) as u32).unwrap_or(defaults.doors),
            stop_begin_delay: stop_begin_delay
                .map(i64::from)
                .unwrap_or(defaults.stop_begin_delay),
            stop_end_delay: stop_end_delay
                .map(i64::from)
                .unwrap_or(defaults.stop_end_delay),
            days_before_delete_video: retention
                .map(i64::from)
                .unwrap_or(defaults.days_before_delete_video),
            camera_urls: vec![cam0.unwrap_or_default(), cam1.unwrap_or_default()],
            replica_addresses: self.load_replica_addresses().await,
        };

        Ok(settings)
    }

    /// Replica address list; best-effort, an unreadable table yields none.
    async fn load_replica_addresses(&self) -> Vec<String> {
        let rows = match sqlx::query("SELECT remoteDBAddress FROM remoteDB")
            .fetch_all(&self.pool)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot read remoteDB table, no replicas");
                return Vec::new();
            }
        };

        rows.into_iter()
            .filter_map(|row| row.try_get::<Option<String>, _>("remoteDBAddress").ok().flatten())
            .filter(|address| !address.is_empty())
            .collect()
    }
}
