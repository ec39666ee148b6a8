//! Neural OCR reader: DB text detector + CRNN recognizer via OpenCV DNN.

use image::DynamicImage;
use opencv::core::{Point, Rect, Scalar, Size, Vector};
use opencv::dnn::{self, TextDetectionModel_DB, TextRecognitionModel};
use opencv::prelude::{
    MatTraitConst, ModelTrait, TextDetectionModelTraitConst, TextDetectionModel_DBTrait,
    TextRecognitionModelTrait, TextRecognitionModelTraitConst,
};
use reelsift_models::TextMethod;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use super::cv::rgb_to_bgr_mat;
use super::engine::{OcrEngine, OcrInput, OcrWord};
use super::geometry::polygon_to_bbox;
use crate::config::TextConfig;
use crate::error::{MediaError, MediaResult};

const ENGINE: &str = "deep_ocr";

/// Detector input side (multiple of 32).
const DET_INPUT_SIZE: i32 = 736;

/// CRNN input size (width x height).
const REC_INPUT_WIDTH: i32 = 100;
const REC_INPUT_HEIGHT: i32 = 32;

/// Two-stage reader: DB finds text polygons, CRNN reads each crop.
pub struct DeepOcrEngine {
    detector: Mutex<TextDetectionModel_DB>,
    recognizer: Mutex<TextRecognitionModel>,
}

fn path_str<'a>(path: &'a Path) -> MediaResult<&'a str> {
    if !path.exists() {
        return Err(MediaError::engine_unavailable(
            ENGINE,
            format!("model file missing: {}", path.display()),
        ));
    }
    path.to_str()
        .ok_or_else(|| MediaError::engine_unavailable(ENGINE, format!("non UTF-8 path: {}", path.display())))
}

impl DeepOcrEngine {
    /// Load both networks; CUDA backend when `use_gpu` is set.
    pub fn new(config: &TextConfig, use_gpu: bool) -> MediaResult<Self> {
        let det_path = path_str(&config.det_model_path)?;
        let rec_path = path_str(&config.rec_model_path)?;

        let vocab_text = std::fs::read_to_string(&config.rec_vocab_path).map_err(|e| {
            MediaError::engine_unavailable(
                ENGINE,
                format!("vocabulary {}: {}", config.rec_vocab_path.display(), e),
            )
        })?;
        let vocabulary: Vector<String> = vocab_text
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        if vocabulary.is_empty() {
            return Err(MediaError::engine_unavailable(ENGINE, "empty vocabulary"));
        }

        let mut detector = TextDetectionModel_DB::new_def(det_path)?;
        detector.set_binary_threshold(0.3)?;
        detector.set_polygon_threshold(0.5)?;
        detector.set_max_candidates(200)?;
        detector.set_unclip_ratio(2.0)?;
        detector.set_input_params(
            1.0 / 255.0,
            Size::new(DET_INPUT_SIZE, DET_INPUT_SIZE),
            Scalar::new(122.678_914_34, 116.668_767_62, 104.006_987_93, 0.0),
            false,
            false,
        )?;

        let mut recognizer = TextRecognitionModel::new_def(rec_path)?;
        recognizer.set_decode_type("CTC-greedy")?;
        recognizer.set_vocabulary(&vocabulary)?;
        recognizer.set_input_params(
            1.0 / 127.5,
            Size::new(REC_INPUT_WIDTH, REC_INPUT_HEIGHT),
            Scalar::all(127.5),
            false,
            false,
        )?;

        if use_gpu {
            detector.set_preferable_backend(dnn::DNN_BACKEND_CUDA)?;
            detector.set_preferable_target(dnn::DNN_TARGET_CUDA)?;
            recognizer.set_preferable_backend(dnn::DNN_BACKEND_CUDA)?;
            recognizer.set_preferable_target(dnn::DNN_TARGET_CUDA)?;
        }

        info!(
            detector = det_path,
            recognizer = rec_path,
            vocabulary = vocabulary.len(),
            gpu = use_gpu,
            "Neural OCR reader ready"
        );

        Ok(Self {
            detector: Mutex::new(detector),
            recognizer: Mutex::new(recognizer),
        })
    }
}

impl OcrEngine for DeepOcrEngine {
    fn name(&self) -> &'static str {
        ENGINE
    }

    fn method(&self) -> TextMethod {
        TextMethod::DeepOcr
    }

    fn input(&self) -> OcrInput {
        OcrInput::Color
    }

    fn recognize(&self, image: &DynamicImage) -> MediaResult<Vec<OcrWord>> {
        let bgr = rgb_to_bgr_mat(&image.to_rgb8())?;
        let (cols, rows) = (bgr.cols(), bgr.rows());

        let mut polygons: Vector<Vector<Point>> = Vector::new();
        let mut confidences: Vector<f32> = Vector::new();
        {
            let detector = self
                .detector
                .lock()
                .map_err(|_| MediaError::internal("Text detector lock poisoned"))?;
            detector.detect_with_confidences(&bgr, &mut polygons, &mut confidences)?;
        }

        let recognizer = self
            .recognizer
            .lock()
            .map_err(|_| MediaError::internal("Text recognizer lock poisoned"))?;

        let mut words = Vec::new();
        for (i, polygon) in polygons.iter().enumerate() {
            let points: Vec<(f32, f32)> = polygon.iter().map(|p| (p.x as f32, p.y as f32)).collect();
            let bbox = match polygon_to_bbox(&points) {
                Some(b) => b,
                None => continue,
            };

            let x = (bbox.x as i32).min(cols - 1);
            let y = (bbox.y as i32).min(rows - 1);
            let w = (bbox.width as i32).min(cols - x);
            let h = (bbox.height as i32).min(rows - y);
            if w <= 0 || h <= 0 {
                continue;
            }

            let crop = opencv::core::Mat::roi(&bgr, Rect::new(x, y, w, h))?.try_clone()?;
            let text = recognizer.recognize(&crop)?;
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            words.push(OcrWord {
                bbox,
                text: text.to_string(),
                confidence: confidences.get(i).unwrap_or(0.0),
            });
        }

        debug!(regions = polygons.len(), words = words.len(), "Neural OCR pass finished");
        Ok(words)
    }
}
