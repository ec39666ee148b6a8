//! Worker configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{WorkerError, WorkerResult};

/// Which filters reject a candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterConfig {
    /// Shortest accepted duration in seconds (inclusive)
    pub min_duration: f64,
    /// Longest accepted duration in seconds (inclusive)
    pub max_duration: f64,
    /// Reject anything that is not taller than wide
    pub vertical: bool,
    /// Reject videos with a face
    pub faces: bool,
    /// Reject videos with on-screen text
    pub text: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_duration: 0.0,
            max_duration: 600.0,
            vertical: true,
            faces: true,
            text: true,
        }
    }
}

impl FilterConfig {
    /// Returns true if `duration` lies in `[min_duration, max_duration]`.
    pub fn duration_in_range(&self, duration: f64) -> bool {
        self.min_duration <= duration && duration <= self.max_duration
    }

    /// Upper bound handed to yt-dlp so over-long videos are never fetched.
    pub fn download_max_duration(&self) -> Option<u64> {
        (self.max_duration.is_finite() && self.max_duration > 0.0)
            .then(|| self.max_duration.ceil() as u64)
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// JSON file with the candidate records
    pub candidates_file: PathBuf,
    /// Root for per-video download directories
    pub temp_dir: PathBuf,
    /// Where `results.json` and `accepted_list.txt` are written
    pub output_dir: PathBuf,
    /// Accept/reject rules
    pub filters: FilterConfig,
    /// Maximum videos downloaded and analyzed at once
    pub max_concurrent_videos: usize,
    /// Per-video download timeout
    pub download_timeout: Duration,
    /// Per-video analysis timeout
    pub analysis_timeout: Duration,
    /// Leftover downloads older than this are removed at startup
    pub stale_temp_age: Duration,
    /// Prometheus listener address; no exporter when unset
    pub metrics_addr: Option<SocketAddr>,
    /// Emit JSON logs instead of ANSI text
    pub log_json: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            candidates_file: PathBuf::from("candidates.json"),
            temp_dir: PathBuf::from("tmp"),
            output_dir: PathBuf::from("outputs"),
            filters: FilterConfig::default(),
            max_concurrent_videos: 8,
            download_timeout: Duration::from_secs(300),
            analysis_timeout: Duration::from_secs(600),
            stale_temp_age: Duration::from_secs(3600), // 1 hour
            metrics_addr: None,
            log_json: false,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            candidates_file: std::env::var("CANDIDATES_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.candidates_file),
            temp_dir: std::env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            filters: FilterConfig {
                min_duration: std::env::var("MIN_DURATION")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.filters.min_duration),
                max_duration: std::env::var("MAX_DURATION")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.filters.max_duration),
                vertical: env_flag("FILTER_VERTICAL", defaults.filters.vertical),
                faces: env_flag("FILTER_FACES", defaults.filters.faces),
                text: env_flag("FILTER_TEXT", defaults.filters.text),
            },
            max_concurrent_videos: std::env::var("WORKER_MAX_VIDEOS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent_videos),
            download_timeout: Duration::from_secs(
                std::env::var("DOWNLOAD_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            analysis_timeout: Duration::from_secs(
                std::env::var("ANALYSIS_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            stale_temp_age: Duration::from_secs(
                std::env::var("TEMP_MAX_AGE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            metrics_addr: std::env::var("METRICS_ADDR")
                .ok()
                .and_then(|s| s.parse().ok()),
            log_json: std::env::var("LOG_FORMAT")
                .map(|v| v.to_lowercase() == "json")
                .unwrap_or(false),
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.max_concurrent_videos == 0 {
            return Err(WorkerError::config_error("WORKER_MAX_VIDEOS must be at least 1"));
        }
        let f = &self.filters;
        if f.min_duration.is_nan() || f.max_duration.is_nan() || f.min_duration > f.max_duration {
            return Err(WorkerError::config_error(format!(
                "invalid duration range [{}, {}]",
                f.min_duration, f.max_duration
            )));
        }
        if self.download_timeout.is_zero() || self.analysis_timeout.is_zero() {
            return Err(WorkerError::config_error("timeouts must be positive"));
        }
        Ok(())
    }
}

/// `true`/`1`/`yes` enable, `false`/`0`/`no` disable, anything else keeps `default`.
fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key).map(|v| v.trim().to_lowercase()) {
        Ok(v) if matches!(v.as_str(), "true" | "1" | "yes") => true,
        Ok(v) if matches!(v.as_str(), "false" | "0" | "no") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrent_videos, 8);
        assert_eq!(config.download_timeout, Duration::from_secs(300));
        assert_eq!(config.analysis_timeout, Duration::from_secs(600));
        assert!(config.filters.vertical && config.filters.faces && config.filters.text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duration_range_inclusive() {
        let filters = FilterConfig {
            min_duration: 5.0,
            max_duration: 60.0,
            ..FilterConfig::default()
        };
        assert!(filters.duration_in_range(5.0));
        assert!(filters.duration_in_range(60.0));
        assert!(!filters.duration_in_range(60.5));
        assert!(!filters.duration_in_range(0.0));
        assert_eq!(filters.download_max_duration(), Some(60));
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = WorkerConfig::default();
        config.max_concurrent_videos = 0;
        assert!(config.validate().is_err());

        let mut config = WorkerConfig::default();
        config.filters.min_duration = 100.0;
        config.filters.max_duration = 10.0;
        assert!(config.validate().is_err());

        let mut config = WorkerConfig::default();
        config.analysis_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_flag_fallback() {
        assert!(env_flag("REELSIFT_TEST_UNSET_FLAG", true));
        assert!(!env_flag("REELSIFT_TEST_UNSET_FLAG", false));
    }
}
