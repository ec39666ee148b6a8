//! Skip-sampled scanning with early exit.
//!
//! Both detectors walk a video the same way: decode one frame, hand it to a
//! per-frame callback, skip ahead `skip - 1` frames without conversion, repeat.
//! The scan stops at the first frame that yields a detection, at end of
//! stream, or when the optional frame cap is reached. A scan with a deadline
//! fails with [`MediaError::Timeout`] once it passes it.

use reelsift_models::Detection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;
use crate::metrics;
use crate::source::FrameSource;

/// Wall-clock limit on one video's analysis, optionally tied to a shared
/// cancel flag that expires it early.
#[derive(Debug, Clone)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
    cancelled: Option<Arc<AtomicBool>>,
}

impl Deadline {
    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
            cancelled: None,
        }
    }

    /// Also expire as soon as `flag` is set.
    pub fn or_cancelled(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = Some(flag);
        self
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
            || self
                .cancelled
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// `Err(MediaError::Timeout)` once the deadline has passed or was cancelled.
    pub fn check(&self) -> MediaResult<()> {
        if self.is_expired() {
            return Err(MediaError::Timeout(self.budget.as_secs()));
        }
        Ok(())
    }
}

/// How to walk a video.
#[derive(Debug, Clone)]
pub struct ScanPlan {
    /// Frames between inspected frames (>= 1)
    pub skip: u64,
    /// Stop after inspecting this many frames
    pub max_frames: Option<u64>,
    /// Abandon the scan once this passes
    pub deadline: Option<Deadline>,
}

impl ScanPlan {
    pub fn new(skip: u64, max_frames: Option<u64>) -> Self {
        Self {
            skip: skip.max(1),
            max_frames,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Deadline>) -> Self {
        self.deadline = deadline;
        self
    }
}

/// Result of one scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Detections from the first frame that produced any (empty if none did)
    pub detections: Vec<Detection>,
    /// Frames decoded and handed to the callback
    pub frames_visited: u64,
    /// Index of the frame that ended the scan with a hit
    pub hit_frame: Option<u64>,
}

impl ScanOutcome {
    pub fn is_hit(&self) -> bool {
        self.hit_frame.is_some()
    }
}

/// Scan `source` from its current position, calling `detect` on every
/// `plan.skip`-th frame until one returns detections.
///
/// The deadline is checked before every decoded frame; the caller drops the
/// source on error, which stops its decoder.
pub fn scan_with_early_exit<F>(
    source: &mut dyn FrameSource,
    plan: ScanPlan,
    scan_kind: &'static str,
    mut detect: F,
) -> MediaResult<ScanOutcome>
where
    F: FnMut(&Frame) -> Vec<Detection>,
{
    let mut outcome = ScanOutcome::default();

    loop {
        if let Some(deadline) = &plan.deadline {
            if let Err(e) = deadline.check() {
                warn!(
                    scan = scan_kind,
                    frames_visited = outcome.frames_visited,
                    "Scan deadline passed; abandoning"
                );
                metrics::record_frames_scanned(scan_kind, outcome.frames_visited);
                return Err(e);
            }
        }

        if let Some(cap) = plan.max_frames {
            if outcome.frames_visited >= cap {
                debug!(scan = scan_kind, cap, "Frame cap reached");
                break;
            }
        }

        let frame = match source.read_frame()? {
            Some(frame) => frame,
            None => break,
        };
        outcome.frames_visited += 1;

        let detections = detect(&frame);
        trace!(
            scan = scan_kind,
            frame_index = frame.index,
            detections = detections.len(),
            "Inspected frame"
        );

        if !detections.is_empty() {
            outcome.hit_frame = Some(frame.index);
            outcome.detections = detections;
            break;
        }

        let mut at_end = false;
        for _ in 1..plan.skip {
            if !source.skip_frame()? {
                at_end = true;
                break;
            }
        }
        if at_end {
            break;
        }
    }

    metrics::record_frames_scanned(scan_kind, outcome.frames_visited);
    debug!(
        scan = scan_kind,
        frames_visited = outcome.frames_visited,
        hit_frame = ?outcome.hit_frame,
        "Scan finished"
    );
    Ok(outcome)
}
