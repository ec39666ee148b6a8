#![deny(unreachable_patterns)]
//! Visual content analysis for short-form video filtering.
//!
//! This crate provides:
//! - Duration-based sampling strategies and a shared early-exit scan loop
//! - Frame sources over an `ffmpeg` rawvideo pipe (or OpenCV `VideoCapture`)
//! - ONNX face detection with geometric filters and neighbour confirmation
//! - A layered text detector (Tesseract, neural OCR, vision heuristics)
//! - `ffprobe`/`yt-dlp` probing and candidate downloads

pub mod analyzer;
pub mod config;
pub mod download;
pub mod error;
pub mod face;
pub mod frame;
pub mod metrics;
pub mod probe;
pub mod sampling;
pub mod scan;
pub mod source;
pub mod text;

pub use analyzer::{AnalysisPhase, FrameAnalysis, VideoContentAnalyzer};
pub use config::{DetectionConfig, FaceConfig, TextAggressiveness, TextConfig};
pub use download::{fetch_candidate_video, TEMP_VIDEO_PREFIX};
pub use error::{AnalysisError, MediaError, MediaResult};
pub use face::{Confirmation, FaceDetector, FaceScan, InferenceModel, ModelHandle, RawDetection};
pub use frame::Frame;
pub use probe::{probe_remote, probe_video_props, RemoteMetadata};
pub use sampling::{max_visits, select_strategy, SamplingPolicy};
pub use scan::{scan_with_early_exit, Deadline, ScanOutcome, ScanPlan};
pub use source::{default_opener, FfmpegOpener, FrameSource, VideoOpener};
pub use text::{FrameTextReport, OcrEngine, OcrInput, OcrWord, TextDetector, TextScan};

#[cfg(feature = "opencv")]
pub use source::OpenCvOpener;
