//! Serial bench utility simulating the sensor board.
//!
//! Drives the gateway from the device side of a serial pair: sends status
//! frames (optionally with a corrupted complement), runs whole door
//! cycles, and decodes the actuator bytes the controller sends back.
//!
//! ```bash
//! # One frame: everything closed
//! cargo run --bin link-probe -- --port /dev/ttyUSB1 status 0x3F
//!
//! # Door 0 open for 5 seconds, then closed
//! cargo run --bin link-probe -- --port /dev/ttyUSB1 cycle --door 0
//!
//! # Watch actuator traffic
//! cargo run --bin link-probe -- --port /dev/ttyUSB1 monitor --seconds 10
//! ```

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use passflow_gateway::sensor_control::{ActuatorCommand, StatusField, BAUD_RATE};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

#[derive(Parser, Debug)]
#[command(name = "link-probe")]
#[command(about = "Bench-side simulator for the PassFlow sensor link")]
struct Args {
    /// Serial port to open (e.g. /dev/ttyUSB1)
    #[arg(long)]
    port: String,

    #[arg(long, default_value_t = BAUD_RATE)]
    baud: u32,

    #[command(subcommand)]
    command: ProbeCommand,
}

#[derive(Subcommand, Debug)]
enum ProbeCommand {
    /// Send one status frame
    Status {
        /// Status byte, decimal or 0x-prefixed hex
        #[arg(value_parser = parse_byte)]
        status: u8,

        /// Send a deliberately wrong complement
        #[arg(long)]
        corrupt: bool,
    },
    /// Open a door, hold it, close it again, then watch the replies
    Cycle {
        #[arg(long, default_value_t = 0)]
        door: usize,

        #[arg(long, default_value_t = 5)]
        hold_secs: u64,
    },
    /// Print actuator bytes arriving from the controller
    Monitor {
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
}

fn parse_byte(text: &str) -> Result<u8, String> {
    let parsed = if let Some(hex) = text.strip_prefix("0x") {
        u8::from_str_radix(hex, 16)
    } else {
        text.parse()
    };
    parsed.map_err(|e| format!("invalid byte {text:?}: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut port = tokio_serial::new(&args.port, args.baud)
        .timeout(Duration::from_millis(100))
        .open_native_async()
        .map_err(|e| anyhow!("cannot open {}: {e}", args.port))?;
    println!("Connected to {} at {} baud", args.port, args.baud);

    match args.command {
        ProbeCommand::Status { status, corrupt } => {
            send_frame(&mut port, status, corrupt).await?;
        }
        ProbeCommand::Cycle { door, hold_secs } => {
            run_cycle(&mut port, door, hold_secs).await?;
        }
        ProbeCommand::Monitor { seconds } => {
            monitor(&mut port, Duration::from_secs(seconds)).await?;
        }
    }

    Ok(())
}

async fn send_frame(port: &mut SerialStream, status: u8, corrupt: bool) -> Result<()> {
    let inv = if corrupt { !status ^ 0x01 } else { !status };
    port.write_all(&[status, inv]).await?;
    println!(
        "Sent frame [{status:#04X}, {inv:#04X}]{}",
        if corrupt { " (corrupted)" } else { "" }
    );
    Ok(())
}

async fn run_cycle(port: &mut SerialStream, door: usize, hold_secs: u64) -> Result<()> {
    let field = StatusField::for_door(door).ok_or_else(|| anyhow!("no such door: {door}"))?;
    let all_closed = StatusField::MEANINGFUL_MASK;

    println!("--- Door {door} cycle ---");
    send_frame(port, all_closed & !field.mask(), false).await?;
    println!("Door {door} open, waiting for camera/light ON...");
    monitor(port, Duration::from_secs(2)).await?;

    println!("Holding for {hold_secs} seconds...");
    tokio::time::sleep(Duration::from_secs(hold_secs)).await;

    send_frame(port, all_closed, false).await?;
    println!("Door {door} closed, waiting for camera/light OFF...");
    monitor(port, Duration::from_secs(2)).await?;

    println!("--- Cycle complete ---");
    Ok(())
}

async fn monitor(port: &mut SerialStream, window: Duration) -> Result<()> {
    let deadline = tokio::time::Instant::now() + window;
    let mut buf = [0u8; 64];

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, port.read(&mut buf)).await {
            Ok(Ok(0)) => tokio::time::sleep(Duration::from_millis(50)).await,
            Ok(Ok(n)) => {
                for &byte in &buf[..n] {
                    let name = ActuatorCommand::from_code(byte)
                        .map(|cmd| cmd.name())
                        .unwrap_or("Unknown");
                    println!("Received: {byte:#04X} - {name}");
                }
            }
            Ok(Err(e)) => return Err(anyhow!("read failed: {e}")),
            Err(_) => break,
        }
    }

    Ok(())
}
