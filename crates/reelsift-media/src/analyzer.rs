//! Per-video content analysis.
//!
//! Probe the file, pick a sampling strategy from its duration, look for faces
//! and, only when none were found, look for text. The analyzer never retries;
//! callers decide what to do with a failed analysis.

use reelsift_models::{Detection, VideoAnalysis};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::DetectionConfig;
use crate::error::{AnalysisError, MediaResult};
use crate::face::{FaceDetector, ModelHandle};
use crate::frame::Frame;
use crate::metrics;
use crate::sampling::SamplingPolicy;
use crate::scan::Deadline;
use crate::source::{default_opener, VideoOpener};
use crate::text::TextDetector;

/// Where an analysis currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisPhase {
    Idle,
    Probing,
    FaceScan,
    TextScan,
    Done,
    Failed,
}

impl AnalysisPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisPhase::Idle => "idle",
            AnalysisPhase::Probing => "probing",
            AnalysisPhase::FaceScan => "face_scan",
            AnalysisPhase::TextScan => "text_scan",
            AnalysisPhase::Done => "done",
            AnalysisPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for AnalysisPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Both detectors run over one still frame.
#[derive(Debug, Clone, Default)]
pub struct FrameAnalysis {
    pub faces: Vec<Detection>,
    pub text: Vec<Detection>,
    pub degraded: Vec<String>,
}

impl FrameAnalysis {
    pub fn has_face(&self) -> bool {
        !self.faces.is_empty()
    }

    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }
}

/// Face-then-text analyzer shared by all workers.
pub struct VideoContentAnalyzer {
    faces: FaceDetector,
    text: TextDetector,
    opener: Arc<dyn VideoOpener>,
    sampling: SamplingPolicy,
    confirm_faces: bool,
}

impl VideoContentAnalyzer {
    /// Assemble from already built detectors.
    pub fn new(
        faces: FaceDetector,
        text: TextDetector,
        opener: Arc<dyn VideoOpener>,
        config: &DetectionConfig,
    ) -> Self {
        Self {
            faces,
            text,
            opener,
            sampling: config.sampling,
            confirm_faces: config.face.confirm,
        }
    }

    /// Build everything from configuration with the default frame backend.
    ///
    /// Fails when the face model or the decoder tools are missing; missing
    /// OCR engines only degrade the text layer.
    pub fn from_config(config: &DetectionConfig, model: ModelHandle) -> MediaResult<Self> {
        let opener = default_opener()?;
        let faces = FaceDetector::new(model, config, Arc::clone(&opener));
        let text = TextDetector::from_config(config, Arc::clone(&opener));
        Ok(Self::new(faces, text, opener, config))
    }

    pub fn sampling(&self) -> &SamplingPolicy {
        &self.sampling
    }

    fn enter(&self, path: &Path, from: AnalysisPhase, to: AnalysisPhase) -> AnalysisPhase {
        debug!(path = %path.display(), from = %from, to = %to, "Analysis phase");
        to
    }

    /// Analyze one local video file.
    pub fn analyze(&self, path: &Path) -> Result<VideoAnalysis, AnalysisError> {
        self.analyze_until(path, None)
    }

    /// Analyze one local video file, abandoning the scans once `deadline`
    /// expires with `AnalysisError::Scan(MediaError::Timeout)`.
    pub fn analyze_until(
        &self,
        path: &Path,
        deadline: Option<&Deadline>,
    ) -> Result<VideoAnalysis, AnalysisError> {
        let started = Instant::now();
        let result = self.run(path, started, deadline);

        let secs = started.elapsed().as_secs_f64();
        match &result {
            Ok(analysis) => {
                let outcome = if analysis.has_face {
                    "face"
                } else if analysis.has_text {
                    "text"
                } else {
                    "clean"
                };
                metrics::record_analysis(outcome, secs);
            }
            Err(e) if e.is_timeout() => {
                warn!(path = %path.display(), error = %e, "Analysis abandoned at deadline");
                metrics::record_analysis("timeout", secs);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Analysis failed");
                metrics::record_analysis("failed", secs);
            }
        }
        result
    }

    fn run(
        &self,
        path: &Path,
        started: Instant,
        deadline: Option<&Deadline>,
    ) -> Result<VideoAnalysis, AnalysisError> {
        let mut phase = AnalysisPhase::Idle;
        phase = self.enter(path, phase, AnalysisPhase::Probing);

        let props = match self.opener.probe(path) {
            Ok(props) => props,
            Err(e) => {
                self.enter(path, phase, AnalysisPhase::Failed);
                return Err(AnalysisError::Probe(e));
            }
        };
        let strategy = self.sampling.select_strategy(props.duration_seconds());
        info!(
            path = %path.display(),
            fps = props.fps,
            frames = props.frame_count,
            width = props.width,
            height = props.height,
            tier = %strategy.tier,
            skip = strategy.skip_interval(props.fps),
            "Video probed"
        );

        let mut analysis = VideoAnalysis::new(props, strategy);

        phase = self.enter(path, phase, AnalysisPhase::FaceScan);
        let face_scan = if self.confirm_faces {
            self.faces.detect_faces_with_confirmation(path, strategy, deadline)
        } else {
            self.faces.detect_faces_in_video(path, strategy, deadline)
        };
        let face_scan = match face_scan {
            Ok(scan) => scan,
            Err(e) => {
                self.enter(path, phase, AnalysisPhase::Failed);
                return Err(AnalysisError::Scan(e));
            }
        };
        analysis.frames_scanned += face_scan.frames_visited;
        if face_scan.inference_failures > 0 {
            analysis.mark_degraded("face_model");
        }
        analysis.set_faces(face_scan.detections);

        if !analysis.has_face {
            phase = self.enter(path, phase, AnalysisPhase::TextScan);
            let text_scan = match self.text.detect_text_in_video(path, strategy, deadline) {
                Ok(scan) => scan,
                Err(e) => {
                    self.enter(path, phase, AnalysisPhase::Failed);
                    return Err(AnalysisError::Scan(e));
                }
            };
            analysis.frames_scanned += text_scan.frames_visited;
            for layer in text_scan.degraded {
                analysis.mark_degraded(layer);
            }
            analysis.set_text(text_scan.detections);
        }

        analysis.analysis_time_ms = started.elapsed().as_millis() as u64;
        self.enter(path, phase, AnalysisPhase::Done);

        info!(
            path = %path.display(),
            has_face = analysis.has_face,
            has_text = analysis.has_text,
            frames_scanned = analysis.frames_scanned,
            duration_ms = analysis.analysis_time_ms,
            degraded = ?analysis.degraded,
            "Analysis complete"
        );
        Ok(analysis)
    }

    /// Run both detectors over one still frame, without early exit.
    pub fn analyze_frame(&self, frame: &Frame) -> FrameAnalysis {
        let faces = self.faces.detect_faces_in_frame(frame);
        let report = self.text.analyze_frame(frame);
        FrameAnalysis {
            faces,
            text: report.detections,
            degraded: report.degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;
    use crate::face::{MockInferenceModel, RawDetection};
    use crate::source::testing::ScriptedOpener;
    use crate::text::{MockOcrEngine, OcrInput, OcrWord};
    use image::{Rgb, RgbImage};
    use reelsift_models::{PixelBox, SampleTier, TextMethod};
    use std::time::Duration;

    fn face_on_marked() -> MockInferenceModel {
        let mut model = MockInferenceModel::new();
        model.expect_name().return_const("scripted".to_string());
        model.expect_infer().returning(|img, _| {
            if img.get_pixel(0, 0)[0] == 255 {
                Ok(vec![RawDetection {
                    x: 8.0,
                    y: 8.0,
                    width: 32.0,
                    height: 32.0,
                    class_id: 0,
                    confidence: 0.9,
                }])
            } else {
                Ok(vec![])
            }
        });
        model
    }

    fn ocr(calls: usize, words: Vec<OcrWord>) -> MockOcrEngine {
        let mut engine = MockOcrEngine::new();
        engine.expect_name().return_const("tesseract");
        engine.expect_method().return_const(TextMethod::Tesseract);
        engine.expect_input().return_const(OcrInput::Color);
        engine
            .expect_recognize()
            .times(calls)
            .returning(move |_| Ok(words.clone()));
        engine
    }

    fn analyzer(opener: ScriptedOpener, model: MockInferenceModel, engine: MockOcrEngine, config: DetectionConfig) -> VideoContentAnalyzer {
        let opener: Arc<dyn VideoOpener> = Arc::new(opener);
        let faces = FaceDetector::new(
            ModelHandle::from_model(Arc::new(model)),
            &config,
            Arc::clone(&opener),
        );
        let text = TextDetector::new(vec![Arc::new(engine)], &config, Arc::clone(&opener));
        VideoContentAnalyzer::new(faces, text, opener, &config)
    }

    fn no_confirm() -> DetectionConfig {
        let mut config = DetectionConfig::default();
        config.face.confirm = false;
        config
    }

    #[test]
    fn test_face_hit_skips_text_scan() {
        // 40 s at 30 fps: short tier, skip 15, face at frame 45
        let opener = ScriptedOpener::new(30.0, 1200, vec![45]);
        let a = analyzer(opener.clone(), face_on_marked(), ocr(0, vec![]), no_confirm());

        let analysis = a.analyze(Path::new("clip.mp4")).unwrap();
        assert!(analysis.has_face);
        assert!(!analysis.has_text);
        assert_eq!(analysis.tier(), SampleTier::Short);
        assert_eq!(analysis.face_details.len(), 1);
        assert_eq!(analysis.face_details[0].frame_index, 45);
        assert_eq!(analysis.frames_scanned, 4);
        assert_eq!(opener.read_indices(), vec![0, 15, 30, 45]);
    }

    #[test]
    fn test_no_face_runs_text_scan() {
        let opener = ScriptedOpener::new(30.0, 90, vec![]);
        let words = vec![OcrWord {
            bbox: PixelBox::new(2, 2, 40, 10).unwrap(),
            text: "SUBSCRIBE".to_string(),
            confidence: 0.9,
        }];
        let a = analyzer(opener, face_on_marked(), ocr(1, words), no_confirm());

        let analysis = a.analyze(Path::new("clip.mp4")).unwrap();
        assert!(!analysis.has_face);
        assert!(analysis.has_text);
        assert_eq!(analysis.text_details[0].text_content(), Some("SUBSCRIBE"));
        // 6 face frames (0..90 step 15) + 1 text frame
        assert_eq!(analysis.frames_scanned, 7);
    }

    #[test]
    fn test_clean_video() {
        let opener = ScriptedOpener::new(30.0, 90, vec![]);
        let a = analyzer(opener, face_on_marked(), ocr(6, vec![]), no_confirm());

        let analysis = a.analyze(Path::new("clip.mp4")).unwrap();
        assert!(!analysis.has_face && !analysis.has_text);
        assert!(analysis.degraded.is_empty());
    }

    #[test]
    fn test_unconfirmed_face_falls_through_to_text() {
        let opener = ScriptedOpener::new(30.0, 90, vec![45]);
        let a = analyzer(opener, face_on_marked(), ocr(6, vec![]), DetectionConfig::default());

        let analysis = a.analyze(Path::new("clip.mp4")).unwrap();
        assert!(!analysis.has_face);
        assert!(!analysis.has_text);
    }

    #[test]
    fn test_probe_failure() {
        let mut opener = ScriptedOpener::new(30.0, 90, vec![]);
        opener.fail_probe = true;
        let a = analyzer(opener.clone(), face_on_marked(), ocr(0, vec![]), no_confirm());

        let err = a.analyze(Path::new("clip.mp4")).unwrap_err();
        assert!(matches!(err, AnalysisError::Probe(_)));
        assert!(err.media().is_probe_failure());
        assert!(opener.read_indices().is_empty());
    }

    #[test]
    fn test_open_failure_is_scan_error() {
        let mut opener = ScriptedOpener::new(30.0, 90, vec![]);
        opener.fail_open_after = Some(0);
        let a = analyzer(opener, face_on_marked(), ocr(0, vec![]), no_confirm());

        let err = a.analyze(Path::new("clip.mp4")).unwrap_err();
        assert!(matches!(err, AnalysisError::Scan(_)));
    }

    #[test]
    fn test_passed_deadline_is_timeout() {
        let opener = ScriptedOpener::new(30.0, 1200, vec![]);
        let a = analyzer(opener.clone(), face_on_marked(), ocr(0, vec![]), no_confirm());

        let err = a
            .analyze_until(Path::new("clip.mp4"), Some(&Deadline::after(Duration::ZERO)))
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(err.media(), MediaError::Timeout(_)));
        // Probed, but no frame decoded
        assert!(opener.read_indices().is_empty());
    }

    #[test]
    fn test_analyze_frame_runs_both_detectors() {
        let a = analyzer(
            ScriptedOpener::new(30.0, 10, vec![]),
            face_on_marked(),
            ocr(
                1,
                vec![OcrWord {
                    bbox: PixelBox::new(0, 0, 20, 8).unwrap(),
                    text: "hey".to_string(),
                    confidence: 0.7,
                }],
            ),
            no_confirm(),
        );
        let frame = Frame::new(0, 0.0, RgbImage::from_pixel(64, 64, Rgb([255, 255, 255])));

        let result = a.analyze_frame(&frame);
        assert!(result.has_face());
        assert!(result.has_text());
    }
}
