//! Shared message and timestamp types
//!
//! Types that cross component boundaries: the control-bus payload and the
//! recording request it carries, plus the timestamp text helpers used for
//! audit rows and output filenames.

use crate::sensor_control::ActuatorCommand;
use chrono::{DateTime, Local, Utc};

/// Time-windowed extraction request for one camera.
///
/// `start_time`/`stop_time` already include the configured begin/end
/// delays; downstream consumers apply no further adjustment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingRequest {
    pub camera_id: usize,
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
}

/// Control-bus message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Extract a time window from a camera's rolling capture
    Recording(RecordingRequest),
    /// Actuator traffic; not routed by the video orchestrator
    Actuator(ActuatorCommand),
    /// Terminate the consumer's loop
    Shutdown,
}

/// Format a timestamp for audit rows and filenames: `YYYY-MM-DD HH:MM:SS.mmm`
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}

/// Local calendar date for dated output directories: `YYYY-MM-DD`
pub fn current_date_string(now: DateTime<Utc>) -> String {
    now.with_timezone(&Local).format("%Y-%m-%d").to_string()
}

/// Make timestamp text safe for filenames: spaces to `_`, colons to `-`
pub fn sanitize_for_filename(text: &str) -> String {
    text.replace(' ', "_").replace(':', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_spaces_and_colons() {
        assert_eq!(
            sanitize_for_filename("2026-08-07 12:30:45.500"),
            "2026-08-07_12-30-45.500"
        );
    }

    #[test]
    fn timestamp_format_keeps_millis() {
        let ts = DateTime::from_timestamp_millis(1_500).unwrap();
        let text = format_timestamp(ts);
        assert!(text.ends_with(".500"), "unexpected format: {text}");
    }
}
