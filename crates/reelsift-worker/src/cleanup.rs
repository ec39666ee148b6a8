//! Removal of downloads left behind by earlier runs.
//!
//! Per-video directories are normally removed when their task ends; a killed
//! process can still leave them (or loose `temp_video_*` files) behind.

use reelsift_media::TEMP_VIDEO_PREFIX;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use crate::error::WorkerResult;

/// Prefix of the per-video download directories.
pub const VIDEO_DIR_PREFIX: &str = "reelsift_";

fn is_ours(name: &str) -> bool {
    name.starts_with(TEMP_VIDEO_PREFIX) || name.starts_with(VIDEO_DIR_PREFIX)
}

/// Delete our entries in `dir` that were last modified at least `max_age` ago.
///
/// Returns the number of entries removed. A missing `dir` is not an error.
pub async fn sweep_stale_downloads(dir: &Path, max_age: Duration) -> WorkerResult<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let now = SystemTime::now();
    let mut removed = 0usize;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !is_ours(&name) {
            continue;
        }

        let metadata = entry.metadata().await?;
        let age = metadata
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .unwrap_or(Duration::ZERO);
        if age < max_age {
            continue;
        }

        let path = entry.path();
        let result = if metadata.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        match result {
            Ok(()) => {
                debug!(path = %path.display(), age_secs = age.as_secs(), "Removed stale download");
                removed += 1;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove stale download"),
        }
    }

    if removed > 0 {
        info!(dir = %dir.display(), removed, "Swept stale downloads");
    }
    Ok(removed)
}
