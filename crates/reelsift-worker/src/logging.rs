//! Structured per-candidate logging utilities.
//!
//! Every line emitted through [`VideoLogger`] carries the candidate's position
//! in the run and its URL, so interleaved logs from concurrent videos can be
//! told apart.

use reelsift_models::Candidate;
use tracing::{error, info, warn, Span};

/// Candidate logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct VideoLogger {
    index: usize,
    video_id: String,
    url: String,
}

impl VideoLogger {
    /// Create a logger for the candidate at `index` in submission order.
    pub fn new(index: usize, candidate: &Candidate) -> Self {
        let video_id = if candidate.id.is_empty() {
            format!("#{}", index)
        } else {
            candidate.id.clone()
        };
        Self {
            index,
            video_id,
            url: candidate.url.clone(),
        }
    }

    /// Log the start of processing.
    pub fn log_start(&self, message: &str) {
        info!(
            index = self.index,
            video_id = %self.video_id,
            url = %self.url,
            "Video started: {}", message
        );
    }

    /// Log a step during processing.
    pub fn log_progress(&self, message: &str) {
        info!(
            index = self.index,
            video_id = %self.video_id,
            "Video progress: {}", message
        );
    }

    /// Log a non-fatal problem.
    pub fn log_warning(&self, message: &str) {
        warn!(
            index = self.index,
            video_id = %self.video_id,
            "Video warning: {}", message
        );
    }

    /// Log a failure that decides the candidate's outcome.
    pub fn log_error(&self, message: &str) {
        error!(
            index = self.index,
            video_id = %self.video_id,
            url = %self.url,
            "Video error: {}", message
        );
    }

    /// Log the final verdict.
    pub fn log_completion(&self, message: &str) {
        info!(
            index = self.index,
            video_id = %self.video_id,
            "Video completed: {}", message
        );
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    /// Create a tracing span for this candidate.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "video",
            index = self.index,
            video_id = %self.video_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_logger_uses_candidate_id() {
        let mut candidate = Candidate::from_url("https://youtu.be/abc");
        candidate.id = "yt_abc".to_string();
        let logger = VideoLogger::new(3, &candidate);

        assert_eq!(logger.index(), 3);
        assert_eq!(logger.video_id(), "yt_abc");
    }

    #[test]
    fn test_video_logger_falls_back_to_index() {
        let logger = VideoLogger::new(7, &Candidate::from_url("https://youtu.be/x"));
        assert_eq!(logger.video_id(), "#7");
    }
}
