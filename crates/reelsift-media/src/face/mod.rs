//! Face detection over sampled frames.
//!
//! Model boxes are filtered by class, confidence, aspect ratio and minimum
//! size. A video scan stops at the first frame with a surviving face; the
//! optional confirmation pass re-checks the neighbouring frames and drops the
//! hit if none of them shows a face.

mod model;
mod yolo;

pub use model::{InferenceModel, ModelHandle, RawDetection};
pub use yolo::YoloModel;

#[cfg(test)]
pub use model::MockInferenceModel;

use image::imageops::FilterType;
use reelsift_models::{Detection, PixelBox, SampleStrategy};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{DetectionConfig, FaceConfig};
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;
use crate::metrics;
use crate::sampling::SamplingPolicy;
use crate::scan::{scan_with_early_exit, Deadline, ScanPlan};
use crate::source::VideoOpener;

/// Result of scanning one video for faces.
#[derive(Debug, Clone, Default)]
pub struct FaceScan {
    /// Faces from the hit frame (empty when none found or not confirmed)
    pub detections: Vec<Detection>,
    /// Frames decoded, including confirmation neighbours
    pub frames_visited: u64,
    /// Frames where the model call failed
    pub inference_failures: u64,
    /// What happened in the confirmation pass, if one ran
    pub confirmation: Option<Confirmation>,
}

/// Outcome of a confirmation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// A neighbour frame also had a face.
    Confirmed,
    /// No neighbour had a face; the hit was dropped.
    Rejected,
    /// Confirmation could not run; the hit was kept as-is.
    FailedOpen,
}

impl Confirmation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confirmation::Confirmed => "confirmed",
            Confirmation::Rejected => "rejected",
            Confirmation::FailedOpen => "failed_open",
        }
    }
}

/// Face detector bound to one model and one frame backend.
pub struct FaceDetector {
    model: ModelHandle,
    config: FaceConfig,
    sampling: SamplingPolicy,
    opener: Arc<dyn VideoOpener>,
}

impl FaceDetector {
    pub fn new(model: ModelHandle, config: &DetectionConfig, opener: Arc<dyn VideoOpener>) -> Self {
        info!(
            model = %model.name(),
            confidence = config.face.confidence,
            aspect_filter = config.face.aspect_range.is_some(),
            min_size = ?config.face.min_size,
            max_side = ?config.face.max_side,
            "Face detector ready"
        );
        Self {
            model,
            config: config.face.clone(),
            sampling: config.sampling,
            opener,
        }
    }

    pub fn config(&self) -> &FaceConfig {
        &self.config
    }

    /// Detect faces in one frame, propagating model errors.
    pub fn try_detect_faces_in_frame(&self, frame: &Frame) -> MediaResult<Vec<Detection>> {
        let image = match self.prescale_factor(frame.width(), frame.height()) {
            Some(factor) => {
                let w = ((frame.width() as f64 * factor).round() as u32).max(1);
                let h = ((frame.height() as f64 * factor).round() as u32).max(1);
                std::borrow::Cow::Owned(image::imageops::resize(&frame.image, w, h, FilterType::Triangle))
            }
            None => std::borrow::Cow::Borrowed(&frame.image),
        };

        let raw = self.model.infer(&image, self.config.confidence)?;
        Ok(raw
            .iter()
            .filter_map(|r| {
                self.accept(r)
                    .map(|bbox| Detection::face(bbox, r.confidence, frame.index, frame.timestamp))
            })
            .collect())
    }

    /// Detect faces in one frame; model errors are logged, counted and yield no faces.
    pub fn detect_faces_in_frame(&self, frame: &Frame) -> Vec<Detection> {
        match self.try_detect_faces_in_frame(frame) {
            Ok(faces) => faces,
            Err(e) => {
                warn!(frame_index = frame.index, error = %e, "Face inference failed");
                metrics::record_layer_error("face_model");
                Vec::new()
            }
        }
    }

    /// Scan a video until the first frame with a face.
    pub fn detect_faces_in_video(
        &self,
        path: &Path,
        strategy: SampleStrategy,
        deadline: Option<&Deadline>,
    ) -> MediaResult<FaceScan> {
        let mut source = self.opener.open(path, 0)?;
        let plan = ScanPlan::new(
            strategy.skip_interval(source.props().fps),
            self.sampling.max_processed_frames,
        )
        .with_deadline(deadline.cloned());
        debug!(path = %path.display(), skip = plan.skip, "Scanning for faces");

        let mut failures = 0u64;
        let outcome = scan_with_early_exit(source.as_mut(), plan, "face", |frame| {
            match self.try_detect_faces_in_frame(frame) {
                Ok(faces) => faces,
                Err(e) => {
                    failures += 1;
                    warn!(frame_index = frame.index, error = %e, "Face inference failed");
                    metrics::record_layer_error("face_model");
                    Vec::new()
                }
            }
        })?;

        Ok(FaceScan {
            detections: outcome.detections,
            frames_visited: outcome.frames_visited,
            inference_failures: failures,
            confirmation: None,
        })
    }

    /// Scan a video and confirm the hit against its neighbouring frames.
    ///
    /// Any failure while confirming keeps the unconfirmed detections, except
    /// a passed deadline, which is returned.
    pub fn detect_faces_with_confirmation(
        &self,
        path: &Path,
        strategy: SampleStrategy,
        deadline: Option<&Deadline>,
    ) -> MediaResult<FaceScan> {
        let mut scan = self.detect_faces_in_video(path, strategy, deadline)?;
        let hit_frame = match scan.detections.first() {
            Some(d) => d.frame_index,
            None => return Ok(scan),
        };

        let status = match self.confirm(path, hit_frame, deadline) {
            Ok((confirmed, visited)) => {
                scan.frames_visited += visited;
                if confirmed {
                    Confirmation::Confirmed
                } else {
                    Confirmation::Rejected
                }
            }
            Err(e @ MediaError::Timeout(_)) => return Err(e),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    frame_index = hit_frame,
                    error = %e,
                    "Face confirmation failed; keeping unconfirmed detections"
                );
                Confirmation::FailedOpen
            }
        };

        if status == Confirmation::Rejected {
            debug!(frame_index = hit_frame, "Isolated face hit dropped");
            scan.detections.clear();
        }
        metrics::record_face_confirmation(status.as_str());
        scan.confirmation = Some(status);
        Ok(scan)
    }

    /// Check frames `hit - w ..= hit + w` (excluding `hit`) for any face.
    ///
    /// Returns whether one was found and how many frames were decoded.
    fn confirm(&self, path: &Path, hit_frame: u64, deadline: Option<&Deadline>) -> MediaResult<(bool, u64)> {
        let window = self.config.confirmation_window;
        let start = hit_frame.saturating_sub(window);
        let end = hit_frame.saturating_add(window);

        let mut source = self.opener.open(path, start)?;
        let mut visited = 0u64;

        while source.position() <= end {
            if source.position() == hit_frame {
                if !source.skip_frame()? {
                    break;
                }
                continue;
            }
            if let Some(deadline) = deadline {
                deadline.check()?;
            }
            let frame = match source.read_frame()? {
                Some(frame) => frame,
                None => break,
            };
            visited += 1;

            if !self.try_detect_faces_in_frame(&frame)?.is_empty() {
                debug!(hit_frame, neighbour = frame.index, "Face confirmed by neighbour");
                return Ok((true, visited));
            }
        }
        Ok((false, visited))
    }

    fn prescale_factor(&self, width: u32, height: u32) -> Option<f64> {
        let max_side = self.config.max_side?;
        let longest = width.max(height);
        (longest > max_side).then(|| max_side as f64 / longest as f64)
    }

    /// Apply class, confidence, aspect and size filters.
    fn accept(&self, raw: &RawDetection) -> Option<PixelBox> {
        if raw.class_id != self.config.class_id || raw.confidence < self.config.confidence {
            return None;
        }
        let bbox = PixelBox::from_signed(
            raw.x.round() as i64,
            raw.y.round() as i64,
            raw.width.round() as i64,
            raw.height.round() as i64,
        )?;

        if let Some((min_ratio, max_ratio)) = self.config.aspect_range {
            let ratio = bbox.aspect_ratio();
            if ratio < min_ratio || ratio > max_ratio {
                return None;
            }
        }
        if let Some(min) = self.config.min_size {
            if bbox.width < min || bbox.height < min {
                return None;
            }
        }
        Some(bbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::ScriptedOpener;
    use image::{Rgb, RgbImage};
    use reelsift_models::SampleTier;

    fn raw(x: f32, y: f32, w: f32, h: f32, class_id: usize, confidence: f32) -> RawDetection {
        RawDetection {
            x,
            y,
            width: w,
            height: h,
            class_id,
            confidence,
        }
    }

    /// Model that reports one face on white frames.
    fn marked_frame_model() -> MockInferenceModel {
        let mut model = MockInferenceModel::new();
        model.expect_name().return_const("scripted".to_string());
        model.expect_infer().returning(|img, _| {
            if img.get_pixel(0, 0)[0] == 255 {
                Ok(vec![raw(10.0, 10.0, 30.0, 30.0, 0, 0.9)])
            } else {
                Ok(vec![])
            }
        });
        model
    }

    fn detector_with(model: MockInferenceModel, opener: ScriptedOpener, config: DetectionConfig) -> FaceDetector {
        FaceDetector::new(ModelHandle::from_model(Arc::new(model)), &config, Arc::new(opener))
    }

    fn frame(value: u8) -> Frame {
        Frame::new(3, 0.1, RgbImage::from_pixel(64, 64, Rgb([value, value, value])))
    }

    fn short() -> SampleStrategy {
        SampleStrategy::new(SampleTier::Short, 0.5)
    }

    #[test]
    fn test_filters() {
        let mut model = MockInferenceModel::new();
        model.expect_name().return_const("m".to_string());
        model.expect_infer().returning(|_, _| {
            Ok(vec![
                raw(0.0, 0.0, 40.0, 40.0, 0, 0.9),  // kept
                raw(0.0, 0.0, 40.0, 40.0, 1, 0.9),  // wrong class
                raw(0.0, 0.0, 40.0, 40.0, 0, 0.3),  // low confidence
                raw(0.0, 0.0, 80.0, 40.0, 0, 0.9),  // aspect 2.0
                raw(0.0, 0.0, 10.0, 10.0, 0, 0.9),  // too small
            ])
        });
        let detector = detector_with(model, ScriptedOpener::new(30.0, 10, vec![]), DetectionConfig::default());

        let faces = detector.detect_faces_in_frame(&frame(0));
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].bbox, PixelBox::new(0, 0, 40, 40).unwrap());
        assert_eq!(faces[0].frame_index, 3);
        assert!(faces[0].is_face());
    }

    #[test]
    fn test_filters_can_be_disabled() {
        let mut model = MockInferenceModel::new();
        model.expect_name().return_const("m".to_string());
        model
            .expect_infer()
            .returning(|_, _| Ok(vec![raw(0.0, 0.0, 80.0, 8.0, 0, 0.9)]));

        let mut config = DetectionConfig::default();
        config.face.aspect_range = None;
        config.face.min_size = None;
        let detector = detector_with(model, ScriptedOpener::new(30.0, 10, vec![]), config);

        assert_eq!(detector.detect_faces_in_frame(&frame(0)).len(), 1);
    }

    #[test]
    fn test_inference_error_yields_no_faces() {
        let mut model = MockInferenceModel::new();
        model.expect_name().return_const("m".to_string());
        model
            .expect_infer()
            .returning(|_, _| Err(crate::error::MediaError::inference_failed("boom")));
        let detector = detector_with(model, ScriptedOpener::new(30.0, 10, vec![]), DetectionConfig::default());

        assert!(detector.detect_faces_in_frame(&frame(255)).is_empty());
        assert!(detector.try_detect_faces_in_frame(&frame(255)).is_err());
    }

    #[test]
    fn test_prescale_reports_downscaled_coordinates() {
        let mut model = MockInferenceModel::new();
        model.expect_name().return_const("m".to_string());
        model.expect_infer().returning(|img, _| {
            assert_eq!((img.width(), img.height()), (32, 32));
            Ok(vec![raw(4.0, 4.0, 24.0, 24.0, 0, 0.9)])
        });
        let mut config = DetectionConfig::default();
        config.face.max_side = Some(32);
        let detector = detector_with(model, ScriptedOpener::new(30.0, 10, vec![]), config);

        let faces = detector.detect_faces_in_frame(&frame(0));
        assert_eq!(faces[0].bbox, PixelBox::new(4, 4, 24, 24).unwrap());
    }

    #[test]
    fn test_video_scan_stops_at_first_hit() {
        let opener = ScriptedOpener::new(30.0, 1200, vec![45, 60]);
        let detector = detector_with(marked_frame_model(), opener.clone(), DetectionConfig::default());

        let scan = detector.detect_faces_in_video(Path::new("v.mp4"), short(), None).unwrap();
        assert_eq!(scan.frames_visited, 4);
        assert_eq!(scan.detections.len(), 1);
        assert_eq!(scan.detections[0].frame_index, 45);
        assert_eq!(opener.read_indices(), vec![0, 15, 30, 45]);
    }

    #[test]
    fn test_confirmation_keeps_supported_hit() {
        let opener = ScriptedOpener::new(30.0, 1200, vec![45, 47]);
        let detector = detector_with(marked_frame_model(), opener.clone(), DetectionConfig::default());

        let scan = detector
            .detect_faces_with_confirmation(Path::new("v.mp4"), short(), None)
            .unwrap();
        assert_eq!(scan.confirmation, Some(Confirmation::Confirmed));
        assert_eq!(scan.detections.len(), 1);

        // Neighbours 40..=44 then 46, 47; frame 45 itself is skipped
        let reads = opener.read_indices();
        assert_eq!(&reads[4..], &[40, 41, 42, 43, 44, 46, 47]);
    }

    #[test]
    fn test_confirmation_drops_isolated_hit() {
        let opener = ScriptedOpener::new(30.0, 1200, vec![45]);
        let detector = detector_with(marked_frame_model(), opener, DetectionConfig::default());

        let scan = detector
            .detect_faces_with_confirmation(Path::new("v.mp4"), short(), None)
            .unwrap();
        assert_eq!(scan.confirmation, Some(Confirmation::Rejected));
        assert!(scan.detections.is_empty());
        assert_eq!(scan.frames_visited, 4 + 10);
    }

    #[test]
    fn test_confirmation_fails_open() {
        let mut opener = ScriptedOpener::new(30.0, 1200, vec![45]);
        opener.fail_open_after = Some(1);
        let detector = detector_with(marked_frame_model(), opener, DetectionConfig::default());

        let scan = detector
            .detect_faces_with_confirmation(Path::new("v.mp4"), short(), None)
            .unwrap();
        assert_eq!(scan.confirmation, Some(Confirmation::FailedOpen));
        assert_eq!(scan.detections.len(), 1);
    }

    #[test]
    fn test_confirmation_window_clamped_at_start() {
        let opener = ScriptedOpener::new(30.0, 1200, vec![0, 2]);
        let detector = detector_with(marked_frame_model(), opener.clone(), DetectionConfig::default());

        let scan = detector
            .detect_faces_with_confirmation(Path::new("v.mp4"), short(), None)
            .unwrap();
        assert_eq!(scan.confirmation, Some(Confirmation::Confirmed));
        assert_eq!(opener.read_indices(), vec![0, 1, 2]);
    }

    #[test]
    fn test_passed_deadline_aborts_face_scan() {
        let opener = ScriptedOpener::new(30.0, 1200, vec![45]);
        let detector = detector_with(marked_frame_model(), opener.clone(), DetectionConfig::default());
        let deadline = Deadline::after(std::time::Duration::ZERO);

        let err = detector
            .detect_faces_with_confirmation(Path::new("v.mp4"), short(), Some(&deadline))
            .unwrap_err();
        assert!(matches!(err, MediaError::Timeout(_)));
        assert!(opener.read_indices().is_empty());
    }
}
