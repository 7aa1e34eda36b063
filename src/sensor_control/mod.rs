//! SensorControl - serial sensor link ownership
//!
//! ## Responsibilities
//!
//! - Discover and open the USB-serial sensor link
//! - Reader task: byte stream -> frame decoder -> door/power state machine
//! - Writer task: actuator command queue -> link
//! - Cooperative shutdown with bounded joins

mod dispatch;
mod link;
mod monitor;
mod protocol;

pub use dispatch::{ActuatorCommand, CommandDispatcher};
pub use link::{find_device, open, BAUD_RATE};
pub use monitor::{DoorMonitor, DoorState};
pub use protocol::{validate, FrameDecoder, FrameEvent, StatusField, StatusSnapshot};

use crate::audit_log::AuditSink;
use crate::error::Result;
use crate::message_bus::MessageBus;
use crate::models::ControlMessage;
use crate::settings_store::Settings;
use crate::state::AppConfig;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, ReadHalf};
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio_serial::SerialStream;

/// Bound on task joins during stop.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the sensor link and its reader/writer tasks.
pub struct SensorControl {
    stream: Mutex<Option<SerialStream>>,
    dispatcher: Arc<CommandDispatcher>,
    bus: Arc<MessageBus<ControlMessage>>,
    audit: Arc<dyn AuditSink>,
    doors: usize,
    begin_delay_secs: i64,
    end_delay_secs: i64,
    running: Arc<RwLock<bool>>,
    shutdown: Arc<Notify>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SensorControl {
    /// Locate and open the sensor device. Failure here aborts startup.
    pub async fn initialize(
        config: &AppConfig,
        settings: &Settings,
        bus: Arc<MessageBus<ControlMessage>>,
        dispatcher: Arc<CommandDispatcher>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        let path = match &config.serial_port {
            Some(path) => path.clone(),
            None => link::find_device().await?,
        };
        let stream = link::open(&path)?;

        Ok(Self {
            stream: Mutex::new(Some(stream)),
            dispatcher,
            bus,
            audit,
            doors: settings.doors as usize,
            begin_delay_secs: settings.stop_begin_delay,
            end_delay_secs: settings.stop_end_delay,
            running: Arc::new(RwLock::new(false)),
            shutdown: Arc::new(Notify::new()),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the reader and writer tasks.
    pub async fn start(&self) {
        let Some(stream) = self.stream.lock().await.take() else {
            tracing::warn!("SensorControl already started");
            return;
        };

        {
            let mut running = self.running.write().await;
            *running = true;
        }

        let (reader, writer) = tokio::io::split(stream);

        let monitor = DoorMonitor::new(
            self.doors,
            self.begin_delay_secs,
            self.end_delay_secs,
            self.audit.clone(),
            self.bus.clone(),
            self.dispatcher.clone(),
        );

        let reader_task = tokio::spawn(reader_loop(
            reader,
            monitor,
            self.running.clone(),
            self.shutdown.clone(),
        ));
        let writer_task = tokio::spawn(self.dispatcher.clone().run(writer));

        let mut tasks = self.tasks.lock().await;
        tasks.push(reader_task);
        tasks.push(writer_task);

        tracing::info!("SensorControl started");
    }

    /// Stop both loops, drain the command queue, release the link.
    pub async fn stop(&self) {
        {
            let mut running = self.running.write().await;
            if !*running {
                return;
            }
            *running = false;
        }

        self.shutdown.notify_waiters();
        self.dispatcher.request_shutdown();

        let mut tasks = self.tasks.lock().await;
        for mut task in tasks.drain(..) {
            if tokio::time::timeout(JOIN_TIMEOUT, &mut task).await.is_err() {
                tracing::warn!("Sensor task did not stop in time, aborting it");
                task.abort();
            }
        }

        // Both halves are dropped with their tasks; the port is closed now
        tracing::info!("SensorControl stopped");
    }
}

/// Reader loop: pull bytes off the link, decode frames, run the state
/// machine. Faults are logged here and never escape the task.
async fn reader_loop(
    mut reader: ReadHalf<SerialStream>,
    mut monitor: DoorMonitor,
    running: Arc<RwLock<bool>>,
    shutdown: Arc<Notify>,
) {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 256];

    loop {
        if !*running.read().await {
            break;
        }

        let n = tokio::select! {
            result = reader.read(&mut buf) => match result {
                Ok(0) => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
                Ok(n) => n,
                Err(e) => {
                    tracing::error!(error = %e, "Sensor link read failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            },
            _ = shutdown.notified() => break,
        };

        for &byte in &buf[..n] {
            match decoder.feed(byte) {
                FrameEvent::Decoded(snapshot) => {
                    tracing::debug!(
                        status = format_args!("{:#04X}", snapshot.raw()),
                        "Status frame received"
                    );
                    monitor.process(snapshot, Utc::now());
                }
                FrameEvent::Rejected { status, inv } => {
                    tracing::warn!(
                        status = format_args!("{status:#04X}"),
                        inv = format_args!("{inv:#04X}"),
                        "Frame checksum mismatch, frame discarded"
                    );
                }
                FrameEvent::Incomplete => {}
            }
        }
    }

    tracing::info!("Sensor reader stopped");
}
