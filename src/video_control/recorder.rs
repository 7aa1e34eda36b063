//! CameraRecorder - one camera's rolling capture and extractions
//!
//! ## Responsibilities
//!
//! - Keep a capture process writing into the camera's source directory,
//!   restarting it whenever it dies (retry forever, a down feed is
//!   transient)
//! - Rotate the stream on each recording request
//! - Extract the requested window from the previous session's file into
//!   the dated output tree; bounded concurrency, ordered per camera
//! - Delete outputs older than the retention window

use super::ffmpeg;
use crate::audit_log::AuditSink;
use crate::error::{Error, Result};
use crate::models::{
    current_date_string, format_timestamp, sanitize_for_filename, RecordingRequest,
};
use chrono::{DateTime, Local, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::process::Child;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::JoinHandle;

/// Liveness probe interval for the capture process.
const PROBE_INTERVAL: Duration = Duration::from_secs(1);
/// Backoff before relaunching a dead capture process.
const RESTART_BACKOFF: Duration = Duration::from_secs(2);
/// Pause during rotation so the old process releases the file.
const ROTATE_PAUSE: Duration = Duration::from_millis(500);
/// Probes between retention sweeps (one accumulated hour).
const PROBES_PER_CLEANUP: u32 = 3600;
/// Bound on the supervisor join during stop.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Static camera configuration.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub id: usize,
    pub source_url: String,
}

/// The active capture file and when it started.
#[derive(Debug, Clone)]
pub struct CameraSession {
    pub file: PathBuf,
    pub started_at: DateTime<Utc>,
}

#[derive(Default)]
struct CaptureState {
    child: Option<Child>,
    session: Option<CameraSession>,
}

/// Supervised recorder for one camera.
pub struct CameraRecorder {
    config: CameraConfig,
    source_dir: PathBuf,
    output_dir: PathBuf,
    retention_days: i64,
    capture: Mutex<CaptureState>,
    extract_order: Arc<Mutex<()>>,
    extract_permits: Arc<Semaphore>,
    audit: Arc<dyn AuditSink>,
    running: Arc<RwLock<bool>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl CameraRecorder {
    pub async fn new(
        config: CameraConfig,
        video_root: &Path,
        retention_days: i64,
        extract_permits: Arc<Semaphore>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Arc<Self>> {
        let source_dir = video_root.join(format!("Cam{}Source", config.id));
        let output_dir = video_root.join(format!("Cam{}", config.id));
        tokio::fs::create_dir_all(&source_dir).await?;
        tokio::fs::create_dir_all(&output_dir).await?;

        Ok(Arc::new(Self {
            config,
            source_dir,
            output_dir,
            retention_days,
            capture: Mutex::new(CaptureState::default()),
            extract_order: Arc::new(Mutex::new(())),
            extract_permits,
            audit,
            running: Arc::new(RwLock::new(false)),
            supervisor: Mutex::new(None),
        }))
    }

    pub fn id(&self) -> usize {
        self.config.id
    }

    /// Start capturing and spawn the supervisor loop.
    pub async fn start(self: &Arc<Self>) {
        {
            let mut running = self.running.write().await;
            if *running {
                tracing::warn!(camera = self.config.id, "Recorder already running");
                return;
            }
            *running = true;
        }

        if let Err(e) = self.start_capture().await {
            // The supervisor treats a missing child as a dead feed and retries
            tracing::error!(camera = self.config.id, error = %e, "Initial capture start failed");
        }

        let recorder = self.clone();
        let handle = tokio::spawn(recorder.supervisor_loop());
        *self.supervisor.lock().await = Some(handle);

        tracing::info!(camera = self.config.id, "Camera recorder started");
    }

    /// Stop the supervisor and kill the capture process.
    pub async fn stop(&self) {
        {
            let mut running = self.running.write().await;
            if !*running {
                return;
            }
            *running = false;
        }

        {
            let mut capture = self.capture.lock().await;
            self.stop_capture_locked(&mut capture).await;
            capture.session = None;
        }

        if let Some(mut handle) = self.supervisor.lock().await.take() {
            if tokio::time::timeout(JOIN_TIMEOUT, &mut handle).await.is_err() {
                tracing::warn!(camera = self.config.id, "Supervisor did not stop in time, aborting");
                handle.abort();
            }
        }

        tracing::info!(camera = self.config.id, "Camera recorder stopped");
    }

    /// Rotate the stream and schedule extraction of the requested window
    /// from the session that was live while the door stood open.
    pub async fn process_request(self: &Arc<Self>, request: RecordingRequest) {
        let old_session = {
            let mut capture = self.capture.lock().await;
            let old = capture.session.take();
            self.stop_capture_locked(&mut capture).await;
            tokio::time::sleep(ROTATE_PAUSE).await;
            if let Err(e) = self.launch_locked(&mut capture).await {
                tracing::error!(
                    camera = self.config.id,
                    error = %e,
                    "Capture restart after rotation failed"
                );
            }
            old
        };

        let Some(session) = old_session else {
            tracing::error!(
                camera = self.config.id,
                "No active capture session, extraction skipped"
            );
            return;
        };

        // Fire-and-forget, but bounded by the shared permit pool and
        // ordered per camera by the extraction lock.
        let recorder = self.clone();
        tokio::spawn(async move {
            let Ok(_permit) = recorder.extract_permits.clone().acquire_owned().await else {
                return;
            };
            let _slot = recorder.extract_order.clone().lock_owned().await;
            if let Err(e) = recorder.extract_segment(&session, &request).await {
                tracing::error!(
                    camera = recorder.config.id,
                    error = %e,
                    "Segment extraction failed"
                );
            }
        });
    }

    async fn supervisor_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(PROBE_INTERVAL);
        let mut probes_since_cleanup: u32 = 0;

        loop {
            interval.tick().await;
            if !*self.running.read().await {
                break;
            }

            if self.capture_dead().await {
                tracing::warn!(
                    camera = self.config.id,
                    "Capture process stopped unexpectedly, restarting"
                );
                tokio::time::sleep(RESTART_BACKOFF).await;
                if !*self.running.read().await {
                    break;
                }
                if let Err(e) = self.start_capture().await {
                    tracing::error!(camera = self.config.id, error = %e, "Capture restart failed");
                }
            }

            probes_since_cleanup += 1;
            if probes_since_cleanup >= PROBES_PER_CLEANUP {
                probes_since_cleanup = 0;
                self.cleanup_old_videos().await;
            }
        }

        tracing::info!(camera = self.config.id, "Capture supervisor stopped");
    }

    /// True when no live capture child exists.
    async fn capture_dead(&self) -> bool {
        let mut capture = self.capture.lock().await;
        match capture.child.as_mut() {
            None => true,
            Some(child) => match child.try_wait() {
                Ok(None) => false,
                Ok(Some(status)) => {
                    tracing::warn!(
                        camera = self.config.id,
                        status = %status,
                        "Capture process exited"
                    );
                    capture.child = None;
                    true
                }
                Err(e) => {
                    tracing::error!(camera = self.config.id, error = %e, "Capture probe failed");
                    false
                }
            },
        }
    }

    async fn start_capture(&self) -> Result<()> {
        let mut capture = self.capture.lock().await;
        self.launch_locked(&mut capture).await
    }

    async fn launch_locked(&self, capture: &mut CaptureState) -> Result<()> {
        let now = Utc::now();
        let filename = format!(
            "{}_cam{}.mp4",
            now.with_timezone(&Local).format("%Y%m%d_%H%M%S"),
            self.config.id
        );
        let file = self.source_dir.join(filename);

        let child = ffmpeg::capture_command(&self.config.source_url, &file)
            .spawn()
            .map_err(|e| Error::Video(format!("ffmpeg spawn failed: {e}")))?;

        tracing::info!(
            camera = self.config.id,
            file = %file.display(),
            "Capture started"
        );

        capture.child = Some(child);
        capture.session = Some(CameraSession {
            file,
            started_at: now,
        });
        Ok(())
    }

    async fn stop_capture_locked(&self, capture: &mut CaptureState) {
        if let Some(mut child) = capture.child.take() {
            if let Err(e) = child.kill().await {
                tracing::warn!(camera = self.config.id, error = %e, "Capture kill failed");
            }
            if let Some(session) = &capture.session {
                tracing::info!(
                    camera = self.config.id,
                    file = %session.file.display(),
                    "Stopped recording"
                );
            }
        }
    }

    async fn extract_segment(
        &self,
        session: &CameraSession,
        request: &RecordingRequest,
    ) -> Result<()> {
        if !tokio::fs::try_exists(&session.file).await.unwrap_or(false) {
            return Err(Error::Video(format!(
                "source file not found: {}",
                session.file.display()
            )));
        }

        let (offset, duration) =
            extraction_window(session.started_at, request.start_time, request.stop_time);

        let date_dir = self.output_dir.join(current_date_string(Utc::now()));
        tokio::fs::create_dir_all(&date_dir).await?;

        let output = date_dir.join(format!(
            "{}_{}.mp4",
            sanitize_for_filename(&format_timestamp(request.start_time)),
            sanitize_for_filename(&format_timestamp(request.stop_time)),
        ));

        tracing::info!(
            camera = self.config.id,
            output = %output.display(),
            offset,
            duration,
            "Extracting segment"
        );

        let result = ffmpeg::cut_command(&session.file, offset, duration, &output)
            .output()
            .await
            .map_err(|e| Error::Video(format!("ffmpeg spawn failed: {e}")))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(Error::Video(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }

        let filename = output.to_string_lossy().into_owned();
        self.audit.record_segment(
            self.config.id,
            request.start_time,
            request.stop_time,
            &filename,
        );
        tracing::info!(camera = self.config.id, file = %filename, "Segment created");
        Ok(())
    }

    async fn cleanup_old_videos(&self) {
        let retention = Duration::from_secs(self.retention_days.max(0) as u64 * 86_400);
        let cutoff = SystemTime::now() - retention;

        match purge_older_than(&self.output_dir, cutoff).await {
            Ok(0) => {}
            Ok(deleted) => {
                tracing::info!(camera = self.config.id, deleted, "Old videos deleted");
            }
            Err(e) => {
                tracing::error!(camera = self.config.id, error = %e, "Video cleanup failed");
            }
        }
    }
}

/// Cut window in whole seconds relative to the source file start.
///
/// The offset clamps to 0 when the request starts before the file does;
/// the duration clamps to at least 1 second.
pub fn extraction_window(
    file_start: DateTime<Utc>,
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
) -> (i64, i64) {
    let offset = (start - file_start).num_seconds().max(0);
    let duration = (stop - start).num_seconds().max(1);
    (offset, duration)
}

/// Delete `.mp4` files under `root` modified before `cutoff`.
pub async fn purge_older_than(root: &Path, cutoff: SystemTime) -> std::io::Result<usize> {
    let mut deleted = 0;
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                stack.push(path);
                continue;
            }
            if path.extension().is_some_and(|ext| ext == "mp4") {
                let modified = entry.metadata().await?.modified()?;
                if modified < cutoff {
                    tokio::fs::remove_file(&path).await?;
                    tracing::info!(file = %path.display(), "Deleted old video");
                    deleted += 1;
                }
            }
        }
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    #[test]
    fn window_offsets_from_file_start() {
        let (offset, duration) = extraction_window(at(60_000), at(95_000), at(117_500));
        assert_eq!(offset, 35);
        assert_eq!(duration, 22);
    }

    #[test]
    fn window_clamps_offset_to_zero() {
        // Request starts before the rotated file did
        let (offset, duration) = extraction_window(at(100_000), at(95_000), at(117_500));
        assert_eq!(offset, 0);
        assert_eq!(duration, 22);
    }

    #[test]
    fn window_clamps_duration_to_one() {
        let (_, duration) = extraction_window(at(0), at(50_000), at(50_000));
        assert_eq!(duration, 1);
        let (_, duration) = extraction_window(at(0), at(50_000), at(40_000));
        assert_eq!(duration, 1);
    }

    #[tokio::test]
    async fn purge_deletes_only_expired_videos() {
        let root = tempfile::tempdir().unwrap();
        let date_dir = root.path().join("2026-08-07");
        std::fs::create_dir_all(&date_dir).unwrap();

        let now = SystemTime::now();
        let day = Duration::from_secs(86_400);
        let files = [
            ("old.mp4", now - 40 * day),
            ("recent.mp4", now - 10 * day),
            ("fresh.mp4", now - Duration::from_secs(3_600)),
            ("old.txt", now - 40 * day),
        ];
        for (name, mtime) in files {
            let path = date_dir.join(name);
            std::fs::write(&path, b"x").unwrap();
            let file = std::fs::File::options().write(true).open(&path).unwrap();
            file.set_modified(mtime).unwrap();
        }

        let deleted = purge_older_than(root.path(), now - 30 * day).await.unwrap();

        assert_eq!(deleted, 1);
        assert!(!date_dir.join("old.mp4").exists());
        assert!(date_dir.join("recent.mp4").exists());
        assert!(date_dir.join("fresh.mp4").exists());
        // Non-video files are never touched
        assert!(date_dir.join("old.txt").exists());
    }
}
