//! Prometheus metrics for the worker.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use reelsift_models::ResultRecord;
use std::net::SocketAddr;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const VIDEOS_TOTAL: &str = "reelsift_videos_total";
    pub const REJECTIONS_TOTAL: &str = "reelsift_rejections_total";
    pub const DOWNLOAD_DURATION_SECONDS: &str = "reelsift_download_duration_seconds";
    pub const VIDEO_DURATION_SECONDS: &str = "reelsift_video_duration_seconds";
}

/// Install the Prometheus recorder with an HTTP scrape listener on `addr`.
///
/// Must be called from inside the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::metrics_failed(e.to_string()))
}

/// Record a finished candidate.
pub fn record_video(record: &ResultRecord, duration_secs: f64) {
    counter!(names::VIDEOS_TOTAL, "estado" => record.estado.as_str()).increment(1);
    for reason in &record.razones {
        counter!(names::REJECTIONS_TOTAL, "reason" => reason.key()).increment(1);
    }
    histogram!(names::VIDEO_DURATION_SECONDS).record(duration_secs);
}

/// Record a completed download.
pub fn record_download(duration_secs: f64) {
    histogram!(names::DOWNLOAD_DURATION_SECONDS).record(duration_secs);
}
