//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Candidate source failed: {0}")]
    CandidatesFailed(String),

    #[error("Report failed: {0}")]
    ReportFailed(String),

    #[error("Metrics exporter failed: {0}")]
    MetricsFailed(String),

    #[error("Media error: {0}")]
    Media(#[from] reelsift_media::MediaError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn candidates_failed(msg: impl Into<String>) -> Self {
        Self::CandidatesFailed(msg.into())
    }

    pub fn report_failed(msg: impl Into<String>) -> Self {
        Self::ReportFailed(msg.into())
    }

    pub fn metrics_failed(msg: impl Into<String>) -> Self {
        Self::MetricsFailed(msg.into())
    }
}
