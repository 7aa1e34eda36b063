//! Actuator command dispatch
//!
//! Outgoing commands are single bytes from a fixed code table. The
//! dispatcher owns an unbounded queue and one writer loop; writes are
//! best-effort — a failed write is logged and the command dropped.

use crate::message_bus::{MessageBus, TryPop};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// One-byte actuator command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ActuatorCommand {
    RedLedOn = 0x10,
    RedLedOff = 0x11,
    RedLedBlink = 0x12,
    GreenLedOn = 0x13,
    GreenLedOff = 0x14,
    GreenLedBlink = 0x15,
    BlueLedOn = 0x16,
    BlueLedOff = 0x17,
    BlueLedBlink = 0x18,
    Cam0On = 0x19,
    Cam0Off = 0x1A,
    Cam1On = 0x1B,
    Cam1Off = 0x1C,
    Light0On = 0x1D,
    Light0Off = 0x1E,
    Light1On = 0x1F,
    Light1Off = 0x20,
    FanOn = 0x21,
    FanOff = 0x22,
}

impl ActuatorCommand {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        use ActuatorCommand::*;
        let cmd = match code {
            0x10 => RedLedOn,
            0x11 => RedLedOff,
            0x12 => RedLedBlink,
            0x13 => GreenLedOn,
            0x14 => GreenLedOff,
            0x15 => GreenLedBlink,
            0x16 => BlueLedOn,
            0x17 => BlueLedOff,
            0x18 => BlueLedBlink,
            0x19 => Cam0On,
            0x1A => Cam0Off,
            0x1B => Cam1On,
            0x1C => Cam1Off,
            0x1D => Light0On,
            0x1E => Light0Off,
            0x1F => Light1On,
            0x20 => Light1Off,
            0x21 => FanOn,
            0x22 => FanOff,
            _ => return None,
        };
        Some(cmd)
    }

    pub fn name(self) -> &'static str {
        use ActuatorCommand::*;
        match self {
            RedLedOn => "RedLedOn",
            RedLedOff => "RedLedOff",
            RedLedBlink => "RedLedBlink",
            GreenLedOn => "GreenLedOn",
            GreenLedOff => "GreenLedOff",
            GreenLedBlink => "GreenLedBlink",
            BlueLedOn => "BlueLedOn",
            BlueLedOff => "BlueLedOff",
            BlueLedBlink => "BlueLedBlink",
            Cam0On => "Cam0On",
            Cam0Off => "Cam0Off",
            Cam1On => "Cam1On",
            Cam1Off => "Cam1Off",
            Light0On => "Light0On",
            Light0Off => "Light0Off",
            Light1On => "Light1On",
            Light1Off => "Light1Off",
            FanOn => "FanOn",
            FanOff => "FanOff",
        }
    }

    pub fn camera_on(door: usize) -> Option<Self> {
        match door {
            0 => Some(Self::Cam0On),
            1 => Some(Self::Cam1On),
            _ => None,
        }
    }

    pub fn camera_off(door: usize) -> Option<Self> {
        match door {
            0 => Some(Self::Cam0Off),
            1 => Some(Self::Cam1Off),
            _ => None,
        }
    }

    pub fn light_on(door: usize) -> Option<Self> {
        match door {
            0 => Some(Self::Light0On),
            1 => Some(Self::Light1On),
            _ => None,
        }
    }

    pub fn light_off(door: usize) -> Option<Self> {
        match door {
            0 => Some(Self::Light0Off),
            1 => Some(Self::Light1Off),
            _ => None,
        }
    }
}

/// Pop timeout for the writer loop; bounds shutdown latency.
const WRITE_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Outgoing command queue plus its writer loop.
pub struct CommandDispatcher {
    queue: MessageBus<ActuatorCommand>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self {
            queue: MessageBus::new(),
        }
    }

    /// Enqueue a command for the writer loop. Never blocks.
    pub fn send(&self, command: ActuatorCommand) {
        self.queue.push(command);
    }

    /// Close the queue; the writer loop drains what is left and exits.
    pub fn request_shutdown(&self) {
        self.queue.request_shutdown();
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Writer loop: serialize each command to one byte on the link.
    ///
    /// Runs until the queue reports closed. Write failures are logged and
    /// the command is dropped — actuator traffic is best-effort.
    pub async fn run<W>(self: Arc<Self>, mut writer: W)
    where
        W: AsyncWriteExt + Unpin,
    {
        loop {
            match self.queue.try_pop(WRITE_POLL_TIMEOUT).await {
                TryPop::Message(command) => {
                    let byte = [command.code()];
                    match writer.write_all(&byte).await {
                        Ok(()) => {
                            tracing::debug!(
                                code = format_args!("{:#04X}", command.code()),
                                command = command.name(),
                                "Sent command"
                            );
                        }
                        Err(e) => {
                            tracing::error!(
                                command = command.name(),
                                error = %e,
                                "Failed to write to sensor link, command dropped"
                            );
                        }
                    }
                }
                TryPop::Empty => continue,
                TryPop::Closed => break,
            }
        }
        tracing::info!("Command writer stopped");
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_table_matches_device_contract() {
        assert_eq!(ActuatorCommand::RedLedOn.code(), 0x10);
        assert_eq!(ActuatorCommand::BlueLedBlink.code(), 0x18);
        assert_eq!(ActuatorCommand::Cam0On.code(), 0x19);
        assert_eq!(ActuatorCommand::Cam1Off.code(), 0x1C);
        assert_eq!(ActuatorCommand::Light0On.code(), 0x1D);
        assert_eq!(ActuatorCommand::Light1Off.code(), 0x20);
        assert_eq!(ActuatorCommand::FanOff.code(), 0x22);
    }

    #[test]
    fn codes_round_trip() {
        for code in 0x10u8..=0x22 {
            let cmd = ActuatorCommand::from_code(code).expect("valid code");
            assert_eq!(cmd.code(), code);
        }
        assert_eq!(ActuatorCommand::from_code(0x0F), None);
        assert_eq!(ActuatorCommand::from_code(0x23), None);
    }

    #[test]
    fn per_door_commands_exist_for_two_doors_only() {
        assert_eq!(ActuatorCommand::camera_on(0), Some(ActuatorCommand::Cam0On));
        assert_eq!(ActuatorCommand::light_off(1), Some(ActuatorCommand::Light1Off));
        assert_eq!(ActuatorCommand::camera_on(2), None);
        assert_eq!(ActuatorCommand::light_on(2), None);
    }

    #[tokio::test]
    async fn writer_loop_serializes_commands_in_order() {
        let dispatcher = Arc::new(CommandDispatcher::new());
        dispatcher.send(ActuatorCommand::Cam0On);
        dispatcher.send(ActuatorCommand::Light0On);
        dispatcher.request_shutdown();

        let mut sink: Vec<u8> = Vec::new();
        dispatcher.run(&mut sink).await;

        assert_eq!(sink, vec![0x19, 0x1D]);
    }
}
