//! Serial link discovery and open
//!
//! The sensor board sits behind a CH340 USB-serial bridge. Discovery scans
//! the usb-serial bus for a ch341 driver binding and falls back to the
//! conventional ttyUSB paths. The port runs 115200 8N1, raw, no flow
//! control.

use crate::error::{Error, Result};
use std::time::Duration;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

pub const BAUD_RATE: u32 = 115_200;

const USB_SERIAL_SYSFS: &str = "/sys/bus/usb-serial/devices";

/// Locate the sensor device path.
///
/// Scans the usb-serial sysfs entries for a ch341 driver link, then tries
/// `/dev/ttyUSB0`..`/dev/ttyUSB9`. Failure here is fatal to startup.
pub async fn find_device() -> Result<String> {
    match tokio::fs::read_dir(USB_SERIAL_SYSFS).await {
        Ok(mut entries) => {
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.starts_with('.') {
                    continue;
                }

                let driver_path = format!("{USB_SERIAL_SYSFS}/{name}/driver");
                if let Ok(target) = tokio::fs::read_link(&driver_path).await {
                    if target.to_string_lossy().contains("ch341") {
                        let device = format!("/dev/{name}");
                        tracing::info!(device = %device, "Found CH340 sensor device");
                        return Ok(device);
                    }
                }
            }
        }
        Err(e) => {
            tracing::warn!(path = USB_SERIAL_SYSFS, error = %e, "Cannot scan usb-serial bus");
        }
    }

    // Fallback: conventional ttyUSB paths
    for i in 0..10 {
        let device = format!("/dev/ttyUSB{i}");
        if tokio::fs::try_exists(&device).await.unwrap_or(false) {
            tracing::info!(device = %device, "Using fallback serial device");
            return Ok(device);
        }
    }

    Err(Error::DeviceNotFound(
        "no CH340 binding and no /dev/ttyUSB* present".to_string(),
    ))
}

/// Open and configure the serial port: 115200 8N1, raw, 100 ms timeout.
pub fn open(path: &str) -> Result<SerialStream> {
    let stream = tokio_serial::new(path, BAUD_RATE)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(Duration::from_millis(100))
        .open_native_async()?;

    tracing::info!(device = %path, baud = BAUD_RATE, "Serial port opened (115200 8N1)");
    Ok(stream)
}
