use serde::{Deserialize, Serialize};

use crate::detection::Detection;
use crate::sampling::{SampleStrategy, SampleTier};

/// Stream properties of a local video file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoProps {
    /// Frames per second
    pub fps: f64,
    /// Total number of frames
    pub frame_count: u64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl VideoProps {
    /// Duration in seconds (`frame_count / fps`, 0 when fps is unknown).
    pub fn duration_seconds(&self) -> f64 {
        if self.fps > 0.0 {
            self.frame_count as f64 / self.fps
        } else {
            0.0
        }
    }

    /// Returns true if the video is taller than it is wide.
    pub fn is_vertical(&self) -> bool {
        self.height > self.width
    }
}

/// Outcome of analyzing one video.
///
/// Text fields are only populated when face analysis found nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoAnalysis {
    pub has_face: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub face_details: Vec<Detection>,
    pub has_text: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_details: Vec<Detection>,
    /// Wall-clock analysis time
    pub analysis_time_ms: u64,
    /// Probed stream properties
    pub video: VideoProps,
    /// Strategy derived from the probed duration
    pub strategy: SampleStrategy,
    /// Frames actually decoded and inspected across all scans
    pub frames_scanned: u64,
    /// Detection layers that were unavailable or failed during this run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<String>,
}

impl VideoAnalysis {
    /// Empty analysis for a probed video, before any scan.
    pub fn new(video: VideoProps, strategy: SampleStrategy) -> Self {
        Self {
            has_face: false,
            face_details: Vec::new(),
            has_text: false,
            text_details: Vec::new(),
            analysis_time_ms: 0,
            video,
            strategy,
            frames_scanned: 0,
            degraded: Vec::new(),
        }
    }

    /// Record face detections (sets `has_face` accordingly).
    pub fn set_faces(&mut self, faces: Vec<Detection>) {
        self.has_face = !faces.is_empty();
        self.face_details = faces;
    }

    /// Record text detections (sets `has_text` accordingly).
    pub fn set_text(&mut self, text: Vec<Detection>) {
        self.has_text = !text.is_empty();
        self.text_details = text;
    }

    /// Record a degraded layer once.
    pub fn mark_degraded(&mut self, layer: impl Into<String>) {
        let layer = layer.into();
        if !self.degraded.contains(&layer) {
            self.degraded.push(layer);
        }
    }

    /// Sample tier used for this video.
    pub fn tier(&self) -> SampleTier {
        self.strategy.tier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rect::PixelBox;

    fn props() -> VideoProps {
        VideoProps {
            fps: 30.0,
            frame_count: 1200,
            width: 720,
            height: 1280,
        }
    }

    #[test]
    fn test_props_duration() {
        assert!((props().duration_seconds() - 40.0).abs() < f64::EPSILON);
        assert!(props().is_vertical());

        let unknown = VideoProps { fps: 0.0, ..props() };
        assert_eq!(unknown.duration_seconds(), 0.0);
    }

    #[test]
    fn test_set_faces_updates_flag() {
        let mut a = VideoAnalysis::new(props(), SampleStrategy::new(SampleTier::Short, 0.5));
        assert!(!a.has_face);

        let face = Detection::face(PixelBox::new(0, 0, 50, 50).unwrap(), 0.9, 45, 1.5);
        a.set_faces(vec![face]);
        assert!(a.has_face);
        assert!(!a.has_text);
    }

    #[test]
    fn test_degraded_deduplicated_and_omitted_when_empty() {
        let mut a = VideoAnalysis::new(props(), SampleStrategy::new(SampleTier::Short, 0.5));
        let json = serde_json::to_value(&a).unwrap();
        assert!(json.get("degraded").is_none());
        assert!(json.get("text_details").is_none());

        a.mark_degraded("tesseract");
        a.mark_degraded("tesseract");
        assert_eq!(a.degraded, vec!["tesseract".to_string()]);
    }
}
