//! Final per-candidate records.
//!
//! Field names and reason strings follow the report format consumed downstream
//! (`titulo`, `enlace`, `estado`, `razones`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::analysis::VideoAnalysis;
use crate::candidate::{Candidate, Platform};

/// Accept/reject verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Aceptado,
    Descartado,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Aceptado => "aceptado",
            Verdict::Descartado => "descartado",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a candidate was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RejectReason {
    /// Neither the candidate nor a remote probe yielded duration/dimensions.
    MetadataUnavailable,
    /// Width >= height while vertical-only filtering is on.
    Horizontal,
    /// Duration outside the configured range.
    DurationOutOfRange,
    /// The video could not be fetched.
    DownloadFailed,
    /// The downloaded file could not be probed.
    ProbeFailed,
    /// Analysis did not finish in time.
    AnalysisTimeout,
    /// Analysis failed for another reason.
    AnalysisError,
    /// At least one face was found.
    FaceDetected,
    /// At least one text region was found.
    TextDetected,
}

impl RejectReason {
    /// All reasons, in pipeline order.
    pub const ALL: &'static [RejectReason] = &[
        RejectReason::MetadataUnavailable,
        RejectReason::Horizontal,
        RejectReason::DurationOutOfRange,
        RejectReason::DownloadFailed,
        RejectReason::ProbeFailed,
        RejectReason::AnalysisTimeout,
        RejectReason::AnalysisError,
        RejectReason::FaceDetected,
        RejectReason::TextDetected,
    ];

    /// Report string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MetadataUnavailable => "error obteniendo metadatos",
            RejectReason::Horizontal => "orientacion horizontal",
            RejectReason::DurationOutOfRange => "duracion fuera de rango",
            RejectReason::DownloadFailed => "error descarga",
            RejectReason::ProbeFailed => "error leyendo video",
            RejectReason::AnalysisTimeout => "tiempo de analisis agotado",
            RejectReason::AnalysisError => "error de analisis",
            RejectReason::FaceDetected => "rostro detectado",
            RejectReason::TextDetected => "texto detectado",
        }
    }

    /// Stable snake_case key for metrics labels.
    pub fn key(&self) -> &'static str {
        match self {
            RejectReason::MetadataUnavailable => "metadata_unavailable",
            RejectReason::Horizontal => "orientation",
            RejectReason::DurationOutOfRange => "duration",
            RejectReason::DownloadFailed => "download_failure",
            RejectReason::ProbeFailed => "probe_failed",
            RejectReason::AnalysisTimeout => "analysis_timeout",
            RejectReason::AnalysisError => "analysis_error",
            RejectReason::FaceDetected => "face_detected",
            RejectReason::TextDetected => "text_detected",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RejectReason {
    type Err = RejectReasonParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RejectReason::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s || r.key() == s)
            .ok_or_else(|| RejectReasonParseError(s.to_string()))
    }
}

impl From<RejectReason> for String {
    fn from(reason: RejectReason) -> Self {
        reason.as_str().to_string()
    }
}

impl TryFrom<String> for RejectReason {
    type Error = RejectReasonParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Error)]
#[error("Unknown reject reason: {0}")]
pub struct RejectReasonParseError(String);

/// Duration and dimensions as known when the record was built.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ObservedMetadata {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

/// Final record for one candidate.
///
/// `estado` is derived from `razones`: a record is `descartado` exactly when it
/// carries at least one reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub titulo: String,
    pub enlace: String,
    pub id: String,
    pub platform: Platform,
    pub duracion_sec: u64,
    pub width: u32,
    pub height: u32,
    pub resolution: String,
    pub processed_at: DateTime<Utc>,
    pub estado: Verdict,
    pub razones: Vec<RejectReason>,
    /// Error detail for failure reasons
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<VideoAnalysis>,
}

impl ResultRecord {
    /// Build a record; the verdict follows from whether any reason fired.
    pub fn new(
        candidate: &Candidate,
        metadata: ObservedMetadata,
        razones: Vec<RejectReason>,
        analysis: Option<VideoAnalysis>,
    ) -> Self {
        let estado = if razones.is_empty() {
            Verdict::Aceptado
        } else {
            Verdict::Descartado
        };

        let titulo = if candidate.title.is_empty() {
            "Sin título".to_string()
        } else {
            candidate.title.clone()
        };

        Self {
            titulo,
            enlace: candidate.url.clone(),
            id: candidate.id.clone(),
            platform: candidate.platform,
            duracion_sec: metadata.duration.max(0.0) as u64,
            width: metadata.width,
            height: metadata.height,
            resolution: format!("{}x{}", metadata.width, metadata.height),
            processed_at: Utc::now(),
            estado,
            razones,
            error: None,
            analysis,
        }
    }

    /// Attach an error detail.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Returns true if the candidate passed all filters.
    pub fn is_accepted(&self) -> bool {
        self.estado == Verdict::Aceptado
    }
}
