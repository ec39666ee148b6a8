//! End-to-end analyzer runs over painted in-memory videos.
//!
//! Frames are solid colours: red frames hold a "face", green frames hold
//! "text". The fakes below only look at the top-left pixel.

use image::{Rgb, RgbImage};
use reelsift_media::error::MediaError;
use reelsift_media::text::{OcrEngine, OcrInput, OcrWord, TextDetector};
use reelsift_media::{
    AnalysisError, DetectionConfig, FaceDetector, Frame, FrameSource, InferenceModel,
    MediaResult, ModelHandle, RawDetection, VideoContentAnalyzer, VideoOpener,
};
use reelsift_models::{PixelBox, SampleTier, TextMethod, VideoProps};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const RED: Rgb<u8> = Rgb([255, 0, 0]);
const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const GREY: Rgb<u8> = Rgb([90, 90, 90]);

#[derive(Clone, Default)]
struct PaintedVideo {
    frame_count: u64,
    face_frames: Vec<u64>,
    text_frames: Vec<u64>,
    unreadable: bool,
}

impl PaintedVideo {
    fn new(frame_count: u64) -> Self {
        Self {
            frame_count,
            ..Self::default()
        }
    }

    fn faces(mut self, frames: impl IntoIterator<Item = u64>) -> Self {
        self.face_frames.extend(frames);
        self
    }

    fn text(mut self, frames: impl IntoIterator<Item = u64>) -> Self {
        self.text_frames.extend(frames);
        self
    }

    fn props(&self) -> VideoProps {
        VideoProps {
            fps: 30.0,
            frame_count: self.frame_count,
            width: 180,
            height: 320,
        }
    }

    fn colour(&self, index: u64) -> Rgb<u8> {
        if self.face_frames.contains(&index) {
            RED
        } else if self.text_frames.contains(&index) {
            GREEN
        } else {
            GREY
        }
    }
}

impl VideoOpener for PaintedVideo {
    fn probe(&self, path: &Path) -> MediaResult<VideoProps> {
        if self.unreadable {
            return Err(MediaError::ffprobe_failed(
                format!("cannot read {}", path.display()),
                None,
            ));
        }
        Ok(self.props())
    }

    fn open(&self, _path: &Path, start_frame: u64) -> MediaResult<Box<dyn FrameSource>> {
        Ok(Box::new(PaintedSource {
            video: self.clone(),
            next: start_frame,
        }))
    }
}

struct PaintedSource {
    video: PaintedVideo,
    next: u64,
}

impl FrameSource for PaintedSource {
    fn props(&self) -> VideoProps {
        self.video.props()
    }

    fn position(&self) -> u64 {
        self.next
    }

    fn read_frame(&mut self) -> MediaResult<Option<Frame>> {
        if self.next >= self.video.frame_count {
            return Ok(None);
        }
        let index = self.next;
        self.next += 1;
        let props = self.video.props();
        let image = RgbImage::from_pixel(props.width, props.height, self.video.colour(index));
        Ok(Some(Frame::new(index, index as f64 / props.fps, image)))
    }

    fn skip_frame(&mut self) -> MediaResult<bool> {
        if self.next >= self.video.frame_count {
            return Ok(false);
        }
        self.next += 1;
        Ok(true)
    }
}

struct RedFaceModel;

impl InferenceModel for RedFaceModel {
    fn infer(&self, image: &RgbImage, confidence_floor: f32) -> MediaResult<Vec<RawDetection>> {
        if *image.get_pixel(0, 0) != RED || confidence_floor > 0.9 {
            return Ok(Vec::new());
        }
        Ok(vec![RawDetection {
            x: 40.0,
            y: 60.0,
            width: 100.0,
            height: 100.0,
            class_id: 0,
            confidence: 0.9,
        }])
    }

    fn name(&self) -> String {
        "red-face".to_string()
    }
}

#[derive(Default)]
struct GreenTextEngine {
    calls: AtomicUsize,
}

impl OcrEngine for GreenTextEngine {
    fn name(&self) -> &'static str {
        "green-text"
    }

    fn method(&self) -> TextMethod {
        TextMethod::Tesseract
    }

    fn input(&self) -> OcrInput {
        OcrInput::Color
    }

    fn recognize(&self, image: &image::DynamicImage) -> MediaResult<Vec<OcrWord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rgb = image.to_rgb8();
        if *rgb.get_pixel(0, 0) != GREEN {
            return Ok(Vec::new());
        }
        Ok(vec![OcrWord {
            bbox: PixelBox::new(10, 20, 120, 30).expect("non-empty box"),
            text: "SALE".to_string(),
            confidence: 0.9,
        }])
    }
}

fn analyzer(video: PaintedVideo) -> (VideoContentAnalyzer, Arc<GreenTextEngine>) {
    let config = DetectionConfig::default();
    let opener: Arc<dyn VideoOpener> = Arc::new(video);
    let engine = Arc::new(GreenTextEngine::default());

    let faces = FaceDetector::new(
        ModelHandle::from_model(Arc::new(RedFaceModel)),
        &config,
        Arc::clone(&opener),
    );
    let text = TextDetector::new(
        vec![Arc::clone(&engine) as Arc<dyn OcrEngine>],
        &config,
        Arc::clone(&opener),
    );
    (VideoContentAnalyzer::new(faces, text, opener, &config), engine)
}

#[test]
fn confirmed_face_rejects_without_text_scan() {
    // 20 s at 30 fps samples every 15th frame; 45 is the first red sample and
    // its neighbours are red too.
    let (analyzer, engine) = analyzer(PaintedVideo::new(600).faces(40..=50).text([90]));

    let analysis = analyzer.analyze(Path::new("face.mp4")).unwrap();

    assert!(analysis.has_face);
    assert!(!analysis.has_text);
    assert!(analysis.text_details.is_empty());
    assert_eq!(analysis.face_details[0].frame_index, 45);
    assert!(analysis.face_details[0].is_face());
    assert_eq!(analysis.strategy.tier, SampleTier::Short);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn isolated_face_is_dropped_and_text_is_found() {
    let (analyzer, engine) = analyzer(PaintedVideo::new(600).faces([45]).text([90]));

    let analysis = analyzer.analyze(Path::new("flicker.mp4")).unwrap();

    assert!(!analysis.has_face);
    assert!(analysis.face_details.is_empty());
    assert!(analysis.has_text);
    let hit = &analysis.text_details[0];
    assert_eq!(hit.frame_index, 90);
    assert_eq!(hit.text_content(), Some("SALE"));
    assert_eq!(hit.text_method(), Some(TextMethod::Tesseract));
    // Text scan stops at the first green sample: 0, 15, ..., 90
    assert_eq!(engine.calls.load(Ordering::SeqCst), 7);
}

#[test]
fn clean_video_scans_both_passes_to_the_end() {
    let (analyzer, engine) = analyzer(PaintedVideo::new(600));

    let analysis = analyzer.analyze(Path::new("clean.mp4")).unwrap();

    assert!(!analysis.has_face);
    assert!(!analysis.has_text);
    assert!(analysis.degraded.is_empty());
    assert_eq!(analysis.frames_scanned, 80);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 40);
}

#[test]
fn unreadable_file_is_a_probe_failure() {
    let video = PaintedVideo {
        unreadable: true,
        ..PaintedVideo::new(600)
    };
    let (analyzer, engine) = analyzer(video);

    let err = analyzer.analyze(Path::new("broken.mp4")).unwrap_err();

    assert!(matches!(err, AnalysisError::Probe(_)));
    assert!(err.media().is_probe_failure());
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn analysis_serializes_for_reports() {
    let (analyzer, _) = analyzer(PaintedVideo::new(2400).text([0]));

    let analysis = analyzer.analyze(Path::new("long.mp4")).unwrap();
    let json = serde_json::to_value(&analysis).unwrap();

    assert_eq!(json["has_text"], true);
    assert_eq!(json["strategy"]["tier"], "medium");
    assert_eq!(json["text_details"][0]["kind"], "text");
    assert_eq!(json["text_details"][0]["method"], "tesseract");
    assert!(json.get("face_details").is_none());
}
