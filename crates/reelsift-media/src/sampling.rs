//! Duration-based sampling strategy selection.
//!
//! Short clips are inspected densely, long ones sparsely. The default
//! ("careful") policy samples every half second for clips up to a minute and
//! never caps the number of inspected frames; [`SamplingPolicy::fast`] trades
//! recall for throughput.

use reelsift_models::{SampleStrategy, SampleTier};
use serde::{Deserialize, Serialize};

use crate::config::{env_opt, env_or};

/// Thresholds and factors for [`select_strategy`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingPolicy {
    /// Upper bound (inclusive) of the short tier, in seconds
    pub short_max: f64,
    /// Upper bound (inclusive) of the medium tier, in seconds
    pub medium_max: f64,
    /// Seconds between inspected frames for short videos
    pub short_factor: f64,
    /// Seconds between inspected frames for medium videos
    pub medium_factor: f64,
    /// Seconds between inspected frames for long videos
    pub long_factor: f64,
    /// Hard cap on inspected frames per scan (`None` = whole video)
    pub max_processed_frames: Option<u64>,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            short_max: 60.0,
            medium_max: 300.0,
            short_factor: 0.5,
            medium_factor: 1.0,
            long_factor: 2.0,
            max_processed_frames: None,
        }
    }
}

impl SamplingPolicy {
    /// Throughput-oriented regime: sparse sampling and a small frame cap.
    pub fn fast() -> Self {
        Self {
            short_factor: 10.0,
            medium_factor: 15.0,
            long_factor: 20.0,
            max_processed_frames: Some(15),
            ..Self::default()
        }
    }

    /// Create policy from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            short_max: env_or("SAMPLE_SHORT_MAX", defaults.short_max),
            medium_max: env_or("SAMPLE_MEDIUM_MAX", defaults.medium_max),
            short_factor: env_or("FPS_SAMPLE_FACTOR_SHORT", defaults.short_factor),
            medium_factor: env_or("FPS_SAMPLE_FACTOR_MEDIUM", defaults.medium_factor),
            long_factor: env_or("FPS_SAMPLE_FACTOR_LONG", defaults.long_factor),
            max_processed_frames: env_opt("SAMPLE_MAX_FRAMES").filter(|n: &u64| *n > 0),
        }
    }

    /// Map a duration to its sampling strategy.
    pub fn select_strategy(&self, duration_seconds: f64) -> SampleStrategy {
        // NaN and negative durations land in the short (densest) tier.
        if duration_seconds.is_nan() || duration_seconds <= self.short_max {
            SampleStrategy::new(SampleTier::Short, self.short_factor)
        } else if duration_seconds <= self.medium_max {
            SampleStrategy::new(SampleTier::Medium, self.medium_factor)
        } else {
            SampleStrategy::new(SampleTier::Long, self.long_factor)
        }
    }
}

/// Map a duration to a strategy under the default policy.
pub fn select_strategy(duration_seconds: f64) -> SampleStrategy {
    SamplingPolicy::default().select_strategy(duration_seconds)
}

/// Upper bound on frames visited by a skip-sampled scan: `ceil(total / skip)`.
pub fn max_visits(total_frames: u64, skip: u64) -> u64 {
    let skip = skip.max(1);
    total_frames.div_ceil(skip)
}
