//! Candidate video download using yt-dlp.
//!
//! Each download lands in the caller's directory as `temp_video_<uuid>.<ext>`;
//! the caller owns the directory and its cleanup.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{MediaError, MediaResult};

/// Prefix of every downloaded file.
pub const TEMP_VIDEO_PREFIX: &str = "temp_video_";

/// Extensions yt-dlp leaves behind for unfinished downloads.
const PARTIAL_SUFFIXES: [&str; 3] = [".part", ".ytdl", ".temp"];

fn download_args(url: &str, template: &str, max_duration: Option<u64>) -> Vec<String> {
    let mut args = vec![
        "--output".to_string(),
        template.to_string(),
        "--format".to_string(),
        "best".to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--quiet".to_string(),
        "--no-part".to_string(),
    ];
    if let Some(max) = max_duration {
        args.push("--match-filter".to_string());
        args.push(format!("duration <= {}", max));
    }
    args.push(url.to_string());
    args
}

/// Download `url` into `dir` and return the file path.
///
/// The child process is killed if `timeout` elapses. When `max_duration` is
/// set, longer videos are skipped by yt-dlp and reported as a failed download.
pub async fn fetch_candidate_video(
    url: &str,
    dir: &Path,
    timeout: Duration,
    max_duration: Option<u64>,
) -> MediaResult<PathBuf> {
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

    let stem = format!("{}{}", TEMP_VIDEO_PREFIX, Uuid::new_v4().simple());
    let template = dir.join(format!("{}.%(ext)s", stem));
    let template_str = template.to_string_lossy();

    info!(url = %url, dir = %dir.display(), "Downloading candidate video");

    let mut cmd = Command::new("yt-dlp");
    cmd.args(download_args(url, &template_str, max_duration))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| MediaError::Timeout(timeout.as_secs()))??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(url = %url, stderr = %stderr, "yt-dlp stderr");
        return Err(MediaError::download_failed(format!(
            "yt-dlp failed: {}",
            stderr.lines().last().unwrap_or("Unknown error")
        )));
    }

    let path = find_downloaded_file(dir, &stem).await?.ok_or_else(|| {
        MediaError::download_failed(match max_duration {
            Some(max) => format!("No file produced (filtered or longer than {}s)", max),
            None => "No file produced".to_string(),
        })
    })?;

    let size = tokio::fs::metadata(&path).await?.len();
    info!(
        output = %path.display(),
        size_mb = size as f64 / (1024.0 * 1024.0),
        "Downloaded video successfully"
    );
    Ok(path)
}

/// Find the finished file whose name starts with `stem` in `dir`.
async fn find_downloaded_file(dir: &Path, stem: &str) -> MediaResult<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut found: Option<(PathBuf, u64)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(stem) || PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            continue;
        }
        let size = entry.metadata().await?.len();
        if size == 0 {
            continue;
        }
        // Largest match wins when yt-dlp leaves side files behind
        if found.as_ref().map_or(true, |(_, best)| size > *best) {
            found = Some((entry.path(), size));
        }
    }
    Ok(found.map(|(path, _)| path))
}
