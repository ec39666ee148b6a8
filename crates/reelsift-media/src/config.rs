//! Detection configuration.
//!
//! One immutable [`DetectionConfig`] is built at startup (usually via
//! [`DetectionConfig::from_env`]) and handed to every detector constructor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::sampling::SamplingPolicy;

/// Read and parse an env var, falling back to `default` when unset or invalid.
pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Read and parse an optional env var.
pub(crate) fn env_opt<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Read a boolean env var (`1/true/yes/on` or `0/false/no/off`).
pub(crate) fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key).map(|v| v.trim().to_lowercase()) {
        Ok(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Ok(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

/// How hard the text ensemble looks for text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextAggressiveness {
    /// OCR engines only.
    #[default]
    Strict,
    /// OCR engines plus the five vision heuristics (high recall, many false positives).
    Full,
}

impl TextAggressiveness {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextAggressiveness::Strict => "strict",
            TextAggressiveness::Full => "full",
        }
    }

    /// Returns true if heuristic layers should run.
    pub fn uses_heuristics(&self) -> bool {
        matches!(self, TextAggressiveness::Full)
    }
}

impl fmt::Display for TextAggressiveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TextAggressiveness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" | "ocr" => Ok(TextAggressiveness::Strict),
            "full" | "high_recall" | "aggressive" => Ok(TextAggressiveness::Full),
            _ => Err(format!("Unknown text aggressiveness: {}", s)),
        }
    }
}

/// Face detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceConfig {
    /// ONNX model (YOLOv8 output layout)
    pub model_path: PathBuf,
    /// Model class treated as a face
    pub class_id: usize,
    /// Minimum confidence to keep a box
    pub confidence: f32,
    /// Accepted width/height range; `None` disables the aspect filter
    pub aspect_range: Option<(f64, f64)>,
    /// Minimum box side in pixels; `None` disables the size filter
    pub min_size: Option<u32>,
    /// Downscale frames so the longest side is at most this before inference
    pub max_side: Option<u32>,
    /// Model input resolution (square)
    pub input_size: u32,
    /// IoU threshold for per-class NMS on raw model output
    pub nms_threshold: f32,
    /// Re-check neighbouring frames before accepting a hit
    pub confirm: bool,
    /// Neighbour frames on each side scanned during confirmation
    pub confirmation_window: u64,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/face/yolov8n-face.onnx"),
            class_id: 0,
            confidence: 0.45,
            aspect_range: Some((0.7, 1.3)),
            min_size: Some(20),
            max_side: None,
            input_size: 640,
            nms_threshold: 0.45,
            confirm: true,
            confirmation_window: 5,
        }
    }
}

impl FaceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_path: std::env::var("FACE_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            class_id: env_or("FACE_CLASS_ID", defaults.class_id),
            confidence: env_or("FACE_CONFIDENCE", defaults.confidence),
            aspect_range: if env_flag("FACE_ASPECT_FILTER", true) {
                defaults.aspect_range
            } else {
                None
            },
            min_size: match env_opt::<u32>("FACE_MIN_SIZE") {
                Some(0) => None,
                Some(n) => Some(n),
                None => defaults.min_size,
            },
            max_side: env_opt::<u32>("FACE_MAX_SIDE").filter(|n| *n > 0),
            input_size: env_or("FACE_INPUT_SIZE", defaults.input_size),
            nms_threshold: env_or("FACE_NMS_THRESHOLD", defaults.nms_threshold),
            confirm: env_flag("FACE_CONFIRMATION", defaults.confirm),
            confirmation_window: env_or("FACE_CONFIRMATION_WINDOW", defaults.confirmation_window),
        }
    }
}

/// Text ensemble settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextConfig {
    /// Minimum normalized OCR confidence
    pub ocr_confidence: f32,
    /// Minimum trimmed text length
    pub min_text_length: usize,
    /// Which layers run
    pub aggressiveness: TextAggressiveness,
    /// Frames wider than this are downscaled before Tesseract
    pub ocr_max_width: u32,
    /// Tesseract binary
    pub tesseract_cmd: String,
    /// Tesseract language pack(s)
    pub tesseract_lang: String,
    /// Tesseract page segmentation mode
    pub tesseract_psm: u8,
    /// Tesseract engine mode
    pub tesseract_oem: u8,
    /// DB text detector ONNX model for the neural reader
    pub det_model_path: PathBuf,
    /// CRNN recognizer ONNX model for the neural reader
    pub rec_model_path: PathBuf,
    /// Recognizer vocabulary, one symbol per line
    pub rec_vocab_path: PathBuf,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            ocr_confidence: 0.5,
            min_text_length: 2,
            aggressiveness: TextAggressiveness::Strict,
            ocr_max_width: 640,
            tesseract_cmd: "tesseract".to_string(),
            tesseract_lang: "eng+spa".to_string(),
            tesseract_psm: 6,
            tesseract_oem: 3,
            det_model_path: PathBuf::from("models/text/DB_TD500_resnet50.onnx"),
            rec_model_path: PathBuf::from("models/text/crnn_cs.onnx"),
            rec_vocab_path: PathBuf::from("models/text/alphabet_94.txt"),
        }
    }
}

impl TextConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ocr_confidence: env_or("OCR_CONFIDENCE", defaults.ocr_confidence),
            min_text_length: env_or("MIN_TEXT_LENGTH", defaults.min_text_length),
            aggressiveness: env_or("TEXT_AGGRESSIVENESS", defaults.aggressiveness),
            ocr_max_width: env_or("OCR_MAX_WIDTH", defaults.ocr_max_width),
            tesseract_cmd: std::env::var("TESSERACT_CMD").unwrap_or(defaults.tesseract_cmd),
            tesseract_lang: std::env::var("TESSERACT_LANG").unwrap_or(defaults.tesseract_lang),
            tesseract_psm: env_or("TESSERACT_PSM", defaults.tesseract_psm),
            tesseract_oem: env_or("TESSERACT_OEM", defaults.tesseract_oem),
            det_model_path: std::env::var("TEXT_DET_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.det_model_path),
            rec_model_path: std::env::var("TEXT_REC_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.rec_model_path),
            rec_vocab_path: std::env::var("TEXT_REC_VOCAB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.rec_vocab_path),
        }
    }
}

/// Everything the detectors and analyzer need, fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub sampling: SamplingPolicy,
    pub face: FaceConfig,
    pub text: TextConfig,
    /// Prefer GPU execution providers / DNN backends when available
    pub use_gpu: bool,
}

impl DetectionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            sampling: SamplingPolicy::from_env(),
            face: FaceConfig::from_env(),
            text: TextConfig::from_env(),
            use_gpu: env_flag("USE_GPU", false),
        }
    }
}
