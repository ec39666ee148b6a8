//! Shared data models for the ReelSift content filter.
//!
//! This crate provides Serde-serializable types for:
//! - Pixel-space bounding boxes
//! - Face and text detections with provenance
//! - Sampling strategies and per-video analysis summaries
//! - Candidate videos and final accept/reject records

pub mod analysis;
pub mod candidate;
pub mod detection;
pub mod rect;
pub mod result;
pub mod sampling;

// Re-export common types
pub use analysis::{VideoAnalysis, VideoProps};
pub use candidate::{Candidate, Platform};
pub use detection::{Detection, DetectionKind, TextMethod, TextMethodParseError};
pub use rect::PixelBox;
pub use result::{ObservedMetadata, RejectReason, ResultRecord, Verdict};
pub use sampling::{SampleStrategy, SampleTier, SampleTierParseError};
