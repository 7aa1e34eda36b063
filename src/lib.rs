//! PassFlow Gateway Library
//!
//! Access-gateway controller: door/cover/power sensors on a serial link,
//! actuator channel back to the board, and per-door event-clip extraction
//! from continuously recording cameras.
//!
//! ## Architecture (7 Components)
//!
//! 1. SensorControl - serial link ownership, frame decode, door state machine
//! 2. CommandDispatcher - outgoing actuator byte queue + writer loop
//! 3. MessageBus - ordered cross-component message passing
//! 4. VideoControl - recording request routing, recorder lifecycle
//! 5. CameraRecorder - rolling capture, rotation, extraction, retention
//! 6. SettingsStore - database-backed operational settings (SSoT)
//! 7. AuditLog - persistent event and segment audit trail
//!
//! ## Design Principles
//!
//! - Status state lives on the single sensor-reader task, nothing else
//!   mutates it
//! - All store/hardware faults are handled where they occur; only startup
//!   failures (link open, settings load) abort the process

pub mod audit_log;
pub mod error;
pub mod message_bus;
pub mod models;
pub mod sensor_control;
pub mod settings_store;
pub mod state;
pub mod video_control;

pub use error::{Error, Result};
pub use state::AppConfig;
