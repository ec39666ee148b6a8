//! Accept/reject decision for one candidate.
//!
//! Every path through the pipeline ends in exactly one [`VideoOutcome`], and
//! [`compose`] turns it into the final [`ResultRecord`]. A record is only
//! ever `descartado` through a reason, so the verdict and the reasons cannot
//! disagree.

use reelsift_models::{Candidate, ObservedMetadata, RejectReason, ResultRecord, VideoAnalysis};

use crate::config::FilterConfig;

/// How far a candidate got, and what stopped it.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoOutcome {
    /// Rejected from metadata alone.
    Prefiltered {
        reason: RejectReason,
        error: Option<String>,
    },
    /// The file could not be fetched.
    DownloadFailed(String),
    /// The downloaded file could not be probed.
    ProbeFailed(String),
    /// Analysis did not finish within the timeout.
    AnalysisTimedOut,
    /// Analysis failed while scanning, or its task died.
    AnalysisFailed(String),
    /// Analysis finished.
    Analyzed(VideoAnalysis),
}

/// Content reasons for a finished analysis under the enabled filters.
///
/// Faces are checked before text and only the first enabled hit is reported.
pub fn content_reasons(analysis: &VideoAnalysis, filters: &FilterConfig) -> Vec<RejectReason> {
    if filters.faces && analysis.has_face {
        vec![RejectReason::FaceDetected]
    } else if filters.text && analysis.has_text {
        vec![RejectReason::TextDetected]
    } else {
        Vec::new()
    }
}

/// Build the final record.
pub fn compose(
    candidate: &Candidate,
    metadata: ObservedMetadata,
    outcome: VideoOutcome,
    filters: &FilterConfig,
) -> ResultRecord {
    let (reasons, error, analysis) = match outcome {
        VideoOutcome::Prefiltered { reason, error } => (vec![reason], error, None),
        VideoOutcome::DownloadFailed(e) => (vec![RejectReason::DownloadFailed], Some(e), None),
        VideoOutcome::ProbeFailed(e) => (vec![RejectReason::ProbeFailed], Some(e), None),
        VideoOutcome::AnalysisTimedOut => (vec![RejectReason::AnalysisTimeout], None, None),
        VideoOutcome::AnalysisFailed(e) => (vec![RejectReason::AnalysisError], Some(e), None),
        VideoOutcome::Analyzed(analysis) => {
            let reasons = content_reasons(&analysis, filters);
            (reasons, None, Some(analysis))
        }
    };

    let record = ResultRecord::new(candidate, metadata, reasons, analysis);
    match error {
        Some(e) => record.with_error(e),
        None => record,
    }
}
