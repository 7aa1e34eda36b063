//! VideoControl - recording orchestration
//!
//! ## Responsibilities
//!
//! - Build one [`CameraRecorder`] per configured camera
//! - Route recording requests from the control bus to the owning recorder
//! - Own recorder lifecycle and the message loop

mod ffmpeg;
mod recorder;

pub use recorder::{
    extraction_window, purge_older_than, CameraConfig, CameraRecorder, CameraSession,
};

use crate::audit_log::AuditSink;
use crate::error::{Error, Result};
use crate::message_bus::MessageBus;
use crate::models::ControlMessage;
use crate::settings_store::Settings;
use crate::state::AppConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::JoinHandle;

/// Bound on the message-loop join during stop.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Recording orchestrator.
pub struct VideoControl {
    cameras: Vec<Arc<CameraRecorder>>,
    bus: Arc<MessageBus<ControlMessage>>,
    running: Arc<RwLock<bool>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl VideoControl {
    /// Configure recorders from the settings snapshot.
    ///
    /// At least one camera must carry a source URL; none is a fatal
    /// configuration error.
    pub async fn from_settings(
        settings: &Settings,
        config: &AppConfig,
        bus: Arc<MessageBus<ControlMessage>>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        let extract_permits = Arc::new(Semaphore::new(config.extract_jobs.max(1)));
        let mut cameras = Vec::new();

        for camera in 0..settings.doors.min(2) as usize {
            let Some(url) = settings.camera_url(camera) else {
                tracing::warn!(camera, "No source URL configured, camera skipped");
                continue;
            };

            let recorder = CameraRecorder::new(
                CameraConfig {
                    id: camera,
                    source_url: url.to_string(),
                },
                &config.video_root,
                settings.days_before_delete_video,
                extract_permits.clone(),
                audit.clone(),
            )
            .await?;

            tracing::info!(camera, url = %url, "Camera configured");
            cameras.push(recorder);
        }

        if cameras.is_empty() {
            return Err(Error::Config("no cameras configured".to_string()));
        }

        Ok(Self {
            cameras,
            bus,
            running: Arc::new(RwLock::new(false)),
            task: Mutex::new(None),
        })
    }

    /// Start every recorder and the message loop.
    pub async fn start(&self) {
        {
            let mut running = self.running.write().await;
            if *running {
                tracing::warn!("VideoControl already running");
                return;
            }
            *running = true;
        }

        for camera in &self.cameras {
            camera.start().await;
        }

        let cameras = self.cameras.clone();
        let bus = self.bus.clone();
        let handle = tokio::spawn(message_loop(cameras, bus));
        *self.task.lock().await = Some(handle);

        tracing::info!(cameras = self.cameras.len(), "VideoControl started");
    }

    /// Shut the bus, join the loop, stop every recorder.
    pub async fn stop(&self) {
        {
            let mut running = self.running.write().await;
            if !*running {
                return;
            }
            *running = false;
        }

        self.bus.request_shutdown();

        if let Some(mut handle) = self.task.lock().await.take() {
            if tokio::time::timeout(JOIN_TIMEOUT, &mut handle).await.is_err() {
                tracing::warn!("Video message loop did not stop in time, aborting");
                handle.abort();
            }
        }

        for camera in &self.cameras {
            camera.stop().await;
        }

        tracing::info!("VideoControl stopped");
    }
}

/// Route bus messages until shutdown.
async fn message_loop(cameras: Vec<Arc<CameraRecorder>>, bus: Arc<MessageBus<ControlMessage>>) {
    while let Some(message) = bus.pop().await {
        match message {
            ControlMessage::Recording(request) => {
                match cameras.iter().find(|c| c.id() == request.camera_id) {
                    Some(recorder) => {
                        tracing::info!(
                            camera = request.camera_id,
                            start = %request.start_time,
                            stop = %request.stop_time,
                            "Processing recording request"
                        );
                        recorder.process_request(request).await;
                    }
                    None => {
                        tracing::error!(
                            camera = request.camera_id,
                            "Invalid camera ID, request dropped"
                        );
                    }
                }
            }
            ControlMessage::Actuator(command) => {
                tracing::debug!(command = command.name(), "Actuator message not for video control");
            }
            ControlMessage::Shutdown => break,
        }
    }

    tracing::info!("Video message loop stopped");
}
