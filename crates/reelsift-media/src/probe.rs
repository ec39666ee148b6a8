//! Video metadata probing.
//!
//! Local files are probed with `ffprobe`; remote candidates with
//! `yt-dlp --print`, which avoids downloading anything.

use reelsift_models::VideoProps;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Timeout for remote metadata lookups.
pub const REMOTE_PROBE_TIMEOUT: Duration = Duration::from_secs(20);

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: Option<FfprobeTags>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Deserialize)]
struct FfprobeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

impl FfprobeStream {
    /// Display rotation in degrees from the stream tag or display matrix.
    fn rotation(&self) -> i64 {
        let from_tag = self
            .tags
            .as_ref()
            .and_then(|t| t.rotate.as_deref())
            .and_then(|r| r.parse::<f64>().ok());
        let from_side_data = self.side_data_list.iter().find_map(|sd| sd.rotation);
        from_tag.or(from_side_data).unwrap_or(0.0).round() as i64
    }
}

/// Probe a local video file for fps, frame count and dimensions.
///
/// Blocking; call from a blocking context.
pub fn probe_video_props(path: impl AsRef<Path>) -> MediaResult<VideoProps> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let output = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if !output.status.success() {
        return Err(MediaError::ffprobe_failed(
            "FFprobe failed",
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
        ));
    }

    let props = parse_ffprobe_output(&output.stdout)?;
    debug!(
        path = %path.display(),
        fps = props.fps,
        frames = props.frame_count,
        width = props.width,
        height = props.height,
        "Probed video"
    );
    Ok(props)
}

/// Parse `ffprobe -show_format -show_streams` JSON into [`VideoProps`].
///
/// Frame count comes from `nb_frames` when the container records it, otherwise
/// from `duration * fps`.
pub fn parse_ffprobe_output(json: &[u8]) -> MediaResult<VideoProps> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    let fps = video_stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .ok_or_else(|| MediaError::InvalidVideo("Unknown frame rate".to_string()))?;

    let duration = video_stream
        .duration
        .as_deref()
        .or(probe.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0);

    let frame_count = video_stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .or_else(|| duration.map(|d| (d * fps).round() as u64))
        .ok_or_else(|| MediaError::InvalidVideo("Unknown frame count".to_string()))?;

    // FFmpeg autorotates on decode, so report display dimensions.
    let (width, height) = match video_stream.rotation().rem_euclid(180) {
        90 => (video_stream.height.unwrap_or(0), video_stream.width.unwrap_or(0)),
        _ => (video_stream.width.unwrap_or(0), video_stream.height.unwrap_or(0)),
    };
    if width == 0 || height == 0 {
        return Err(MediaError::InvalidVideo(format!(
            "Invalid dimensions {}x{}",
            width, height
        )));
    }

    Ok(VideoProps {
        fps,
        frame_count,
        width,
        height,
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
pub(crate) fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den <= 0.0 {
            return None;
        }
        num / den
    } else {
        s.parse().ok()?
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Metadata of a remote video as reported by yt-dlp.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RemoteMetadata {
    pub duration: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl RemoteMetadata {
    /// Returns true when all three fields are known.
    pub fn is_complete(&self) -> bool {
        self.duration.is_some() && self.width.is_some() && self.height.is_some()
    }
}

/// Look up duration and dimensions of a remote video without downloading it.
pub async fn probe_remote(url: &str) -> MediaResult<RemoteMetadata> {
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

    let mut cmd = tokio::process::Command::new("yt-dlp");
    cmd.args([
        "--skip-download",
        "--no-warnings",
        "--quiet",
        "--no-playlist",
        "--print",
        "%(duration)s|%(width)s|%(height)s",
    ])
    .arg(url)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

    let output = tokio::time::timeout(REMOTE_PROBE_TIMEOUT, cmd.output())
        .await
        .map_err(|_| MediaError::Timeout(REMOTE_PROBE_TIMEOUT.as_secs()))??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::download_failed(format!(
            "yt-dlp metadata lookup failed: {}",
            stderr.lines().last().unwrap_or("Unknown error")
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    Ok(parse_remote_line(line))
}

/// Parse a `duration|width|height` line; `NA`/`None`/garbage fields become `None`.
pub fn parse_remote_line(line: &str) -> RemoteMetadata {
    let mut parts = line.trim().split('|');
    let duration = parts
        .next()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);
    let mut dim = || {
        parts
            .next()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
            .map(|v| v as u32)
    };
    let width = dim();
    let height = dim();

    RemoteMetadata {
        duration,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
        assert!(parse_frame_rate("abc").is_none());
    }

    #[test]
    fn test_parse_ffprobe_nb_frames() {
        let json = br#"{
            "streams": [
                {"codec_type": "audio"},
                {"codec_type": "video", "width": 720, "height": 1280,
                 "avg_frame_rate": "30/1", "nb_frames": "1200"}
            ],
            "format": {"duration": "40.0"}
        }"#;
        let props = parse_ffprobe_output(json).unwrap();
        assert_eq!(props.frame_count, 1200);
        assert_eq!((props.width, props.height), (720, 1280));
        assert!((props.fps - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_ffprobe_falls_back_to_duration() {
        let json = br#"{
            "streams": [{"codec_type": "video", "width": 1080, "height": 1920,
                         "avg_frame_rate": "0/0", "r_frame_rate": "25/1"}],
            "format": {"duration": "12.0"}
        }"#;
        let props = parse_ffprobe_output(json).unwrap();
        assert_eq!(props.frame_count, 300);
        assert!((props.fps - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_ffprobe_rotated_phone_video() {
        let json = br#"{
            "streams": [{"codec_type": "video", "width": 1920, "height": 1080,
                         "avg_frame_rate": "30/1", "nb_frames": "90",
                         "side_data_list": [{"rotation": -90}]}]
        }"#;
        let props = parse_ffprobe_output(json).unwrap();
        assert_eq!((props.width, props.height), (1080, 1920));
        assert!(props.is_vertical());
    }

    #[test]
    fn test_parse_ffprobe_no_video() {
        let json = br#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        assert!(matches!(
            parse_ffprobe_output(json),
            Err(MediaError::InvalidVideo(_))
        ));
    }

    #[test]
    fn test_parse_remote_line() {
        let meta = parse_remote_line("42.5|720|1280\n");
        assert_eq!(meta.duration, Some(42.5));
        assert_eq!(meta.width, Some(720));
        assert_eq!(meta.height, Some(1280));
        assert!(meta.is_complete());

        let partial = parse_remote_line("NA|None|1920");
        assert_eq!(partial.duration, None);
        assert_eq!(partial.width, None);
        assert_eq!(partial.height, Some(1920));
        assert!(!partial.is_complete());

        assert_eq!(parse_remote_line(""), RemoteMetadata::default());
    }
}
