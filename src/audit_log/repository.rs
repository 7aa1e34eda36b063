//! AuditLog repository
//!
//! Row appends for the `events` and `video_segments` tables. Timestamps
//! are stored in the store's text format (see [`crate::models`]).

use crate::error::Result;
use crate::models::format_timestamp;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

#[derive(Clone)]
pub struct AuditRepository {
    pool: MySqlPool,
}

impl AuditRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Append one transition row.
    pub async fn insert_event(&self, description: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("INSERT INTO events (event, DateTime) VALUES (?, ?)")
            .bind(description)
            .bind(format_timestamp(at))
            .execute(&self.pool)
            .await?;

        tracing::debug!(event = description, "Audit event recorded");
        Ok(())
    }

    /// Append one extraction row.
    pub async fn insert_segment(
        &self,
        camera_id: usize,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
        filename: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO video_segments (camera_id, start_time, stop_time, filename) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(camera_id as u32)
        .bind(format_timestamp(start))
        .bind(format_timestamp(stop))
        .bind(filename)
        .execute(&self.pool)
        .await?;

        tracing::debug!(camera_id, filename, "Video segment recorded");
        Ok(())
    }
}
