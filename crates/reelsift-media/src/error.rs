//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("yt-dlp not found in PATH")]
    YtDlpNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Download failed: {message}")]
    DownloadFailed { message: String },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Frame decode failed: {0}")]
    Decode(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("{engine} unavailable: {reason}")]
    EngineUnavailable { engine: String, reason: String },

    #[error("{engine} failed: {message}")]
    EngineFailed { engine: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an FFprobe failure error.
    pub fn ffprobe_failed(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::FfprobeFailed {
            message: message.into(),
            stderr,
        }
    }

    /// Create a download failure error.
    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
        }
    }

    /// Create a frame decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Create an inference failure error.
    pub fn inference_failed(message: impl Into<String>) -> Self {
        Self::InferenceFailed(message.into())
    }

    /// Create a model not found error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    /// Create an engine-unavailable error (missing binary, model or feature).
    pub fn engine_unavailable(engine: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EngineUnavailable {
            engine: engine.into(),
            reason: reason.into(),
        }
    }

    /// Create an engine runtime failure.
    pub fn engine_failed(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EngineFailed {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if the error means the file itself is unreadable.
    pub fn is_probe_failure(&self) -> bool {
        matches!(
            self,
            MediaError::FfprobeFailed { .. }
                | MediaError::FfprobeNotFound
                | MediaError::InvalidVideo(_)
                | MediaError::FileNotFound(_)
        )
    }
}

#[cfg(feature = "opencv")]
impl From<opencv::Error> for MediaError {
    fn from(e: opencv::Error) -> Self {
        MediaError::engine_failed("opencv", e.to_string())
    }
}

/// Errors from [`crate::analyzer::VideoContentAnalyzer::analyze`].
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The file could not be probed; no scan was attempted.
    #[error("probe failed: {0}")]
    Probe(#[source] MediaError),

    /// A scan started but the video could not be read through.
    #[error("scan failed: {0}")]
    Scan(#[source] MediaError),
}

impl AnalysisError {
    /// Underlying media error.
    pub fn media(&self) -> &MediaError {
        match self {
            AnalysisError::Probe(e) | AnalysisError::Scan(e) => e,
        }
    }

    /// The scan was abandoned at its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AnalysisError::Scan(MediaError::Timeout(_)))
    }
}
