//! SettingsStore data types

/// Operational settings snapshot from the `settings` table.
///
/// NULL columns fall back to the defaults below; the row itself must
/// exist or startup fails.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Number of doors/cameras in service (at most 2 are addressable)
    pub doors: u32,
    /// Seconds of footage kept before the door-open instant
    pub stop_begin_delay: i64,
    /// Seconds of footage kept after the door-close instant
    pub stop_end_delay: i64,
    /// Extracted output retention, in days
    pub days_before_delete_video: i64,
    /// Per-camera capture source URL, index = camera id
    pub camera_urls: Vec<String>,
    /// Replica store addresses from the `remoteDB` table
    pub replica_addresses: Vec<String>,
}

impl Settings {
    /// Source URL for one camera; empty strings count as unconfigured.
    pub fn camera_url(&self, camera: usize) -> Option<&str> {
        self.camera_urls
            .get(camera)
            .map(String::as_str)
            .filter(|url| !url.is_empty())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            doors: 2,
            stop_begin_delay: 5,
            stop_end_delay: 5,
            days_before_delete_video: 30,
            camera_urls: Vec::new(),
            replica_addresses: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_url_counts_as_unconfigured() {
        let settings = Settings {
            camera_urls: vec!["rtsp://cam0/stream".to_string(), String::new()],
            ..Default::default()
        };

        assert_eq!(settings.camera_url(0), Some("rtsp://cam0/stream"));
        assert_eq!(settings.camera_url(1), None);
        assert_eq!(settings.camera_url(2), None);
    }
}
