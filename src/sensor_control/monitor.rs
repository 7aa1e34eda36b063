//! Door/power state machine
//!
//! Consumes validated status snapshots on the sensor-reader task, audits
//! every bit transition, and turns door edges into actuator commands and
//! recording requests. All state here is owned by the single reader task;
//! nothing else mutates it.

use crate::audit_log::AuditSink;
use crate::message_bus::MessageBus;
use crate::models::{ControlMessage, RecordingRequest};
use crate::sensor_control::dispatch::{ActuatorCommand, CommandDispatcher};
use crate::sensor_control::protocol::{StatusField, StatusSnapshot};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Runtime state for one door. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct DoorState {
    pub open_since: Option<DateTime<Utc>>,
    pub is_open: bool,
}

/// Per-door finite state machine over the status bit stream.
pub struct DoorMonitor {
    previous: Option<StatusSnapshot>,
    current: Option<StatusSnapshot>,
    doors: Vec<DoorState>,
    begin_delay: Duration,
    end_delay: Duration,
    audit: Arc<dyn AuditSink>,
    bus: Arc<MessageBus<ControlMessage>>,
    dispatcher: Arc<CommandDispatcher>,
}

impl DoorMonitor {
    pub fn new(
        doors: usize,
        begin_delay_secs: i64,
        end_delay_secs: i64,
        audit: Arc<dyn AuditSink>,
        bus: Arc<MessageBus<ControlMessage>>,
        dispatcher: Arc<CommandDispatcher>,
    ) -> Self {
        // The actuator table only addresses doors 0 and 1
        let doors = doors.min(2);
        Self {
            previous: None,
            current: None,
            doors: vec![DoorState::default(); doors],
            begin_delay: Duration::seconds(begin_delay_secs),
            end_delay: Duration::seconds(end_delay_secs),
            audit,
            bus,
            dispatcher,
        }
    }

    pub fn door_state(&self, door: usize) -> Option<&DoorState> {
        self.doors.get(door)
    }

    /// The retained `(previous, current)` snapshot pair.
    pub fn snapshot_pair(&self) -> (Option<StatusSnapshot>, Option<StatusSnapshot>) {
        (self.previous, self.current)
    }

    /// Process one validated snapshot: audit changed bits, advance the
    /// snapshot pair, apply door edge side effects.
    pub fn process(&mut self, incoming: StatusSnapshot, now: DateTime<Utc>) {
        let Some(current) = self.current else {
            // First validated frame seeds the pair; a controller starting
            // next to an already-open door must not fabricate edges.
            self.previous = Some(incoming);
            self.current = Some(incoming);
            tracing::info!(
                status = format_args!("{:#04X}", incoming.raw()),
                "Initial status received"
            );
            return;
        };

        let changed = current.changed_fields(incoming);

        for field in StatusField::ALL {
            if changed & field.mask() == 0 {
                continue;
            }
            let level = incoming.is_set(field);
            let description = field.describe(level);
            tracing::info!(event = description, "Status transition");
            self.audit.record_event(description, now);
        }

        // The pair advances on every validated frame, changed or not
        self.previous = Some(current);
        self.current = Some(incoming);
        if changed == 0 {
            return;
        }
        tracing::debug!(
            previous = format_args!("{:#04X}", current.raw()),
            current = format_args!("{:#04X}", incoming.raw()),
            "Status advanced"
        );

        for door in 0..self.doors.len() {
            let Some(field) = StatusField::for_door(door) else {
                continue;
            };
            if changed & field.mask() == 0 {
                continue;
            }

            if !incoming.is_set(field) {
                self.on_door_opened(door, now);
            } else {
                self.on_door_closed(door, now);
            }
        }
    }

    fn on_door_opened(&mut self, door: usize, now: DateTime<Utc>) {
        let state = &mut self.doors[door];
        state.open_since = Some(now);
        state.is_open = true;

        if let Some(cmd) = ActuatorCommand::camera_on(door) {
            self.dispatcher.send(cmd);
        }
        if let Some(cmd) = ActuatorCommand::light_on(door) {
            self.dispatcher.send(cmd);
        }
        tracing::info!(door, "Door opened, camera and light on");
    }

    fn on_door_closed(&mut self, door: usize, now: DateTime<Utc>) {
        let state = &mut self.doors[door];
        if !state.is_open {
            // Close edge with no matching open: nothing to record
            tracing::debug!(door, "Close edge without prior open, ignored");
            return;
        }
        state.is_open = false;

        if let Some(opened_at) = state.open_since {
            let request = RecordingRequest {
                camera_id: door,
                start_time: opened_at - self.begin_delay,
                stop_time: now + self.end_delay,
            };
            tracing::info!(
                door,
                start = %request.start_time,
                stop = %request.stop_time,
                "Door closed, recording window queued"
            );
            self.bus.push(ControlMessage::Recording(request));
        }

        if let Some(cmd) = ActuatorCommand::camera_off(door) {
            self.dispatcher.send(cmd);
        }
        if let Some(cmd) = ActuatorCommand::light_off(door) {
            self.dispatcher.send(cmd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<String>>,
    }

    impl AuditSink for RecordingSink {
        fn record_event(&self, description: &str, _at: DateTime<Utc>) {
            self.events.lock().unwrap().push(description.to_string());
        }

        fn record_segment(
            &self,
            _camera_id: usize,
            _start: DateTime<Utc>,
            _stop: DateTime<Utc>,
            _filename: &str,
        ) {
        }
    }

    struct Fixture {
        monitor: DoorMonitor,
        sink: Arc<RecordingSink>,
        bus: Arc<MessageBus<ControlMessage>>,
        dispatcher: Arc<CommandDispatcher>,
    }

    fn fixture(doors: usize) -> Fixture {
        let sink = Arc::new(RecordingSink::default());
        let bus = Arc::new(MessageBus::new());
        let dispatcher = Arc::new(CommandDispatcher::new());
        let monitor = DoorMonitor::new(
            doors,
            5,
            5,
            sink.clone(),
            bus.clone(),
            dispatcher.clone(),
        );
        Fixture {
            monitor,
            sink,
            bus,
            dispatcher,
        }
    }

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    fn snap(byte: u8) -> StatusSnapshot {
        StatusSnapshot::from_byte(byte)
    }

    async fn drain_commands(dispatcher: Arc<CommandDispatcher>) -> Vec<u8> {
        dispatcher.request_shutdown();
        let mut sink = Vec::new();
        dispatcher.run(&mut sink).await;
        sink
    }

    #[test]
    fn first_frame_seeds_without_events() {
        let mut f = fixture(2);
        f.monitor.process(snap(0x00), at(0));
        assert!(f.sink.events.lock().unwrap().is_empty());
        assert!(f.bus.is_empty());
        assert_eq!(f.dispatcher.pending(), 0);
    }

    #[test]
    fn audit_events_match_hamming_distance() {
        let cases = [
            (0x3F, 0x3F, 0),
            (0x3F, 0x3E, 1),
            (0x00, 0x3F, 6),
            (0x15, 0x2A, 6),
            (0x3F, 0x33, 2),
            // Reserved bits flip without any event
            (0x3F, 0xFF, 0),
            (0x00, 0xC0, 0),
        ];

        for (from, to, expected) in cases {
            let mut f = fixture(2);
            f.monitor.process(snap(from), at(0));
            f.monitor.process(snap(to), at(1_000));
            let count = f.sink.events.lock().unwrap().len();
            assert_eq!(count, expected, "from {from:#04x} to {to:#04x}");
        }
    }

    #[test]
    fn audit_descriptions_use_device_vocabulary() {
        let mut f = fixture(2);
        f.monitor.process(snap(0x3F), at(0));
        // Door 0 opens (bit0 1->0), main supply drops (bit4 1->0)
        f.monitor.process(snap(0x2E), at(1_000));

        let events = f.sink.events.lock().unwrap();
        assert!(events.contains(&"Door 0 open".to_string()));
        assert!(events.contains(&"Main supply OFF".to_string()));
    }

    #[tokio::test]
    async fn recording_window_applies_both_delays() {
        let mut f = fixture(2);
        f.monitor.process(snap(0x3F), at(0));
        // Door 0 opens at T=100.000, closes at T=112.500
        f.monitor.process(snap(0x3E), at(100_000));
        f.monitor.process(snap(0x3F), at(112_500));

        let msg = f.bus.pop().await.unwrap();
        let ControlMessage::Recording(request) = msg else {
            panic!("expected recording request, got {msg:?}");
        };
        assert_eq!(request.camera_id, 0);
        assert_eq!(request.start_time, at(95_000));
        assert_eq!(request.stop_time, at(117_500));
        assert!(f.bus.is_empty(), "exactly one request per close edge");
    }

    #[tokio::test]
    async fn door_open_close_cycle_sends_command_pairs() {
        let mut f = fixture(2);
        f.monitor.process(snap(0x3F), at(0));
        f.monitor.process(snap(0x3D), at(1_000)); // door 1 opens
        f.monitor.process(snap(0x3F), at(5_000)); // door 1 closes

        let bytes = drain_commands(f.dispatcher).await;
        assert_eq!(
            bytes,
            vec![
                ActuatorCommand::Cam1On.code(),
                ActuatorCommand::Light1On.code(),
                ActuatorCommand::Cam1Off.code(),
                ActuatorCommand::Light1Off.code(),
            ]
        );
    }

    #[tokio::test]
    async fn unmatched_close_is_a_no_op() {
        let mut f = fixture(2);
        // Seeded while the door bit already reads open; no open edge seen
        f.monitor.process(snap(0x3E), at(0));
        f.monitor.process(snap(0x3F), at(10_000)); // close edge, is_open false

        assert!(f.bus.is_empty());
        let bytes = drain_commands(f.dispatcher).await;
        assert!(bytes.is_empty());
        // The transition itself is still audited
        assert_eq!(*f.sink.events.lock().unwrap(), vec!["Door 0 closed"]);
    }

    #[tokio::test]
    async fn cover_and_power_bits_have_no_side_effects() {
        let mut f = fixture(2);
        f.monitor.process(snap(0x3F), at(0));
        // Cover 0 opens, ignition drops
        f.monitor.process(snap(0x1B), at(1_000));

        assert!(f.bus.is_empty());
        assert_eq!(f.dispatcher.pending(), 0);
        assert_eq!(f.sink.events.lock().unwrap().len(), 2);
    }

    #[test]
    fn door_bits_beyond_configured_count_only_audit() {
        let mut f = fixture(1);
        f.monitor.process(snap(0x3F), at(0));
        f.monitor.process(snap(0x3D), at(1_000)); // door 1 opens, unconfigured

        assert!(f.bus.is_empty());
        assert_eq!(f.dispatcher.pending(), 0);
        assert_eq!(*f.sink.events.lock().unwrap(), vec!["Door 1 open"]);
    }

    #[test]
    fn snapshot_pair_advances_together() {
        let mut f = fixture(2);
        f.monitor.process(snap(0x3F), at(0));
        assert_eq!(
            f.monitor.snapshot_pair(),
            (Some(snap(0x3F)), Some(snap(0x3F)))
        );

        f.monitor.process(snap(0x3E), at(1_000));
        assert_eq!(
            f.monitor.snapshot_pair(),
            (Some(snap(0x3F)), Some(snap(0x3E)))
        );

        // A frame differing only in reserved bits still becomes current
        f.monitor.process(snap(0xBE), at(2_000));
        assert_eq!(
            f.monitor.snapshot_pair(),
            (Some(snap(0x3E)), Some(snap(0xBE)))
        );
    }

    #[test]
    fn reopening_refreshes_open_since() {
        let mut f = fixture(2);
        f.monitor.process(snap(0x3F), at(0));
        f.monitor.process(snap(0x3E), at(10_000));
        f.monitor.process(snap(0x3F), at(20_000));
        f.monitor.process(snap(0x3E), at(30_000));

        let state = f.monitor.door_state(0).unwrap();
        assert!(state.is_open);
        assert_eq!(state.open_since, Some(at(30_000)));
    }
}
