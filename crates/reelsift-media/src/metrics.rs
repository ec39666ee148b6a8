//! Detection metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! binary installs a recorder.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_SCANNED_TOTAL: &str = "reelsift_frames_scanned_total";
    pub const LAYER_ERRORS_TOTAL: &str = "reelsift_layer_errors_total";
    pub const LAYER_DETECTIONS_TOTAL: &str = "reelsift_layer_detections_total";
    pub const FACE_CONFIRMATIONS_TOTAL: &str = "reelsift_face_confirmations_total";
    pub const ANALYSIS_DURATION_SECONDS: &str = "reelsift_analysis_duration_seconds";
    pub const ANALYSES_TOTAL: &str = "reelsift_analyses_total";
}

/// Record frames decoded by one scan.
pub fn record_frames_scanned(scan: &str, frames: u64) {
    counter!(names::FRAMES_SCANNED_TOTAL, "scan" => scan.to_string()).increment(frames);
}

/// Record a failed or unavailable detection layer.
pub fn record_layer_error(layer: &str) {
    counter!(names::LAYER_ERRORS_TOTAL, "layer" => layer.to_string()).increment(1);
}

/// Record detections contributed by one layer (before deduplication).
pub fn record_layer_detections(layer: &str, count: usize) {
    if count > 0 {
        counter!(names::LAYER_DETECTIONS_TOTAL, "layer" => layer.to_string())
            .increment(count as u64);
    }
}

/// Record the outcome of a face confirmation pass.
pub fn record_face_confirmation(outcome: &str) {
    counter!(names::FACE_CONFIRMATIONS_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

/// Record a finished analysis.
pub fn record_analysis(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::ANALYSES_TOTAL, &labels).increment(1);
    histogram!(names::ANALYSIS_DURATION_SECONDS, &labels).record(duration_secs);
}
