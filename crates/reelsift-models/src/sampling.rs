//! Sampling strategy definitions.
//!
//! Duration tiers decide how densely a video's frames are inspected:
//!
//! - `Short`: clips up to the short threshold (densest sampling)
//! - `Medium`: clips up to the medium threshold
//! - `Long`: anything longer (sparsest sampling)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Duration tier of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SampleTier {
    #[default]
    Short,
    Medium,
    Long,
}

impl SampleTier {
    /// Returns the tier name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleTier::Short => "short",
            SampleTier::Medium => "medium",
            SampleTier::Long => "long",
        }
    }
}

impl fmt::Display for SampleTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SampleTier {
    type Err = SampleTierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "short" => Ok(SampleTier::Short),
            "medium" => Ok(SampleTier::Medium),
            "long" => Ok(SampleTier::Long),
            _ => Err(SampleTierParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown sample tier: {0}")]
pub struct SampleTierParseError(String);

/// How to sample one video. Derived once from its duration and never changed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleStrategy {
    /// Duration tier
    pub tier: SampleTier,
    /// Seconds of video between inspected frames
    pub fps_factor: f64,
}

impl SampleStrategy {
    /// Create a strategy.
    pub fn new(tier: SampleTier, fps_factor: f64) -> Self {
        Self { tier, fps_factor }
    }

    /// Number of frames to advance between inspected frames.
    ///
    /// `max(1, round(video_fps * fps_factor))`; non-finite or non-positive
    /// products degrade to inspecting every frame.
    pub fn skip_interval(&self, video_fps: f64) -> u64 {
        let raw = (video_fps * self.fps_factor).round();
        if raw.is_finite() && raw >= 1.0 {
            raw as u64
        } else {
            1
        }
    }
}
