//! ffmpeg invocation
//!
//! Two argument contracts: continuous stream-copy capture into a rolling
//! source file, and a time-offset cut with the fixed visual transform
//! (downscale + desaturate). Children are spawned with `kill_on_drop` so a
//! dropped handle can never leave an orphan encoder behind.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Continuous capture: stream copy from the camera source into `output`.
pub fn capture_command(source_url: &str, output: &Path) -> Command {
    let mut cmd = Command::new("ffmpeg");
    if source_url.starts_with("rtsp://") {
        // TCP transport is far more reliable than UDP for IP cameras
        cmd.args(["-rtsp_transport", "tcp"]);
    }
    cmd.arg("-i")
        .arg(source_url)
        .args(["-c:v", "copy", "-c:a", "copy", "-f", "mp4", "-loglevel", "error", "-y"])
        .arg(output)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    cmd
}

/// Segment cut: `[offset, offset+duration)` seconds of `source`, downscaled
/// to 640x480 with reduced saturation, H.264 encoded into `output`.
pub fn cut_command(source: &Path, offset_secs: i64, duration_secs: i64, output: &Path) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-i")
        .arg(source)
        .args(["-ss", &offset_secs.to_string(), "-t", &duration_secs.to_string()])
        .args(["-vf", "scale=640:480,hue=s=0.8"])
        .args(["-c:v", "libx264", "-preset", "fast", "-crf", "23", "-c:a", "copy"])
        .args(["-loglevel", "error", "-y"])
        .arg(output)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn args_of(cmd: &Command) -> Vec<OsString> {
        cmd.as_std().get_args().map(|a| a.to_os_string()).collect()
    }

    #[test]
    fn capture_uses_stream_copy() {
        let cmd = capture_command("rtsp://cam/stream", Path::new("/tmp/out.mp4"));
        let args = args_of(&cmd);
        assert_eq!(args[0], "-rtsp_transport");
        assert!(args.contains(&OsString::from("copy")));
        assert!(args.contains(&OsString::from("/tmp/out.mp4")));
    }

    #[test]
    fn capture_skips_rtsp_transport_for_other_sources() {
        let cmd = capture_command("/dev/video0", Path::new("/tmp/out.mp4"));
        let args = args_of(&cmd);
        assert_ne!(args[0], "-rtsp_transport");
    }

    #[test]
    fn cut_carries_window_and_transform() {
        let cmd = cut_command(Path::new("/tmp/src.mp4"), 17, 23, Path::new("/tmp/cut.mp4"));
        let args = args_of(&cmd);

        let ss = args.iter().position(|a| a == "-ss").unwrap();
        assert_eq!(args[ss + 1], "17");
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "23");
        assert!(args.contains(&OsString::from("scale=640:480,hue=s=0.8")));
        assert!(args.contains(&OsString::from("libx264")));
    }
}
