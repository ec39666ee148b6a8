//! Multi-layer text detection.
//!
//! A frame goes through every enabled layer in a fixed order: the OCR engines
//! first (Tesseract, then the neural reader), then the vision heuristics when
//! aggressiveness is `full`. Outputs are concatenated, filtered for valid
//! text and deduplicated by overlap, so earlier layers win ties.
//!
//! Layers are isolated from each other: an engine that errors or was never
//! available contributes nothing for that frame and is reported as degraded.

mod dedup;
mod engine;
mod geometry;
mod layer;
mod preprocess;
mod tesseract;

#[cfg(feature = "opencv")]
mod cv;
#[cfg(feature = "opencv")]
mod deep;
#[cfg(feature = "opencv")]
mod heuristics;

pub use dedup::dedup_overlapping;
pub use engine::{OcrEngine, OcrInput, OcrWord};
pub use geometry::{polygon_to_bbox, unrotate_box};
pub use layer::HeuristicLayer;
pub use preprocess::{adaptive_threshold, binarize_for_ocr, cap_width};
pub use tesseract::{parse_tsv, TesseractEngine};

#[cfg(feature = "opencv")]
pub use deep::DeepOcrEngine;

#[cfg(test)]
pub use engine::MockOcrEngine;

use image::{DynamicImage, GrayImage};
use rayon::prelude::*;
use reelsift_models::{Detection, SampleStrategy};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{DetectionConfig, TextConfig};
use crate::error::MediaResult;
use crate::frame::Frame;
use crate::metrics;
use crate::sampling::SamplingPolicy;
use crate::scan::{scan_with_early_exit, Deadline, ScanPlan};
use crate::source::VideoOpener;

/// Text findings for one frame plus the layers that did not contribute.
#[derive(Debug, Clone, Default)]
pub struct FrameTextReport {
    pub detections: Vec<Detection>,
    pub degraded: Vec<String>,
}

/// Result of scanning one video for text.
#[derive(Debug, Clone, Default)]
pub struct TextScan {
    /// Text from the hit frame (empty when none found)
    pub detections: Vec<Detection>,
    pub frames_visited: u64,
    /// Layers that failed or were unavailable on any visited frame
    pub degraded: Vec<String>,
}

enum Layer<'a> {
    Ocr(&'a dyn OcrEngine),
    Heuristic(HeuristicLayer),
}

impl Layer<'_> {
    fn name(&self) -> &'static str {
        match self {
            Layer::Ocr(engine) => engine.name(),
            Layer::Heuristic(h) => h.name(),
        }
    }
}

/// The text ensemble, built once and shared across videos.
pub struct TextDetector {
    engines: Vec<Arc<dyn OcrEngine>>,
    heuristics: Vec<HeuristicLayer>,
    unavailable: Vec<String>,
    config: TextConfig,
    sampling: SamplingPolicy,
    opener: Arc<dyn VideoOpener>,
}

impl TextDetector {
    /// Build the ensemble with the engines available on this host.
    ///
    /// Engines that fail to load are logged and reported as degraded on
    /// every frame instead of aborting startup.
    pub fn from_config(config: &DetectionConfig, opener: Arc<dyn VideoOpener>) -> Self {
        let loaded = vec![
            ("tesseract", load_tesseract(&config.text)),
            ("deep_ocr", load_deep_ocr(&config.text, config.use_gpu)),
        ];
        Self::from_loaded(loaded, config, opener)
    }

    /// Build the ensemble from engine load results, in evaluation order.
    pub fn from_loaded(
        loaded: Vec<(&'static str, MediaResult<Arc<dyn OcrEngine>>)>,
        config: &DetectionConfig,
        opener: Arc<dyn VideoOpener>,
    ) -> Self {
        let mut engines: Vec<Arc<dyn OcrEngine>> = Vec::new();
        let mut unavailable = Vec::new();
        for (name, result) in loaded {
            match result {
                Ok(engine) => engines.push(engine),
                Err(e) => {
                    warn!(engine = name, error = %e, "OCR engine unavailable; continuing without it");
                    unavailable.push(name);
                }
            }
        }

        let mut detector = Self::new(engines, config, opener);
        for name in unavailable {
            detector.mark_unavailable(name);
        }
        detector
    }

    /// Build the ensemble around explicit OCR engines (in evaluation order).
    pub fn new(
        engines: Vec<Arc<dyn OcrEngine>>,
        config: &DetectionConfig,
        opener: Arc<dyn VideoOpener>,
    ) -> Self {
        let mut detector = Self {
            engines,
            heuristics: Vec::new(),
            unavailable: Vec::new(),
            config: config.text.clone(),
            sampling: config.sampling,
            opener,
        };

        if config.text.aggressiveness.uses_heuristics() {
            if cfg!(feature = "opencv") {
                detector.heuristics = HeuristicLayer::ALL.to_vec();
            } else {
                warn!("Full text aggressiveness requested but heuristics need the opencv feature");
                for layer in HeuristicLayer::ALL {
                    detector.mark_unavailable(layer.name());
                }
            }
        }

        info!(
            engines = ?detector.engines.iter().map(|e| e.name()).collect::<Vec<_>>(),
            heuristics = detector.heuristics.len(),
            unavailable = ?detector.unavailable,
            aggressiveness = %config.text.aggressiveness,
            "Text detector ready"
        );
        detector
    }

    fn mark_unavailable(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.unavailable.contains(&name) {
            metrics::record_layer_error(&name);
            self.unavailable.push(name);
        }
    }

    /// Layers that could not be set up.
    pub fn unavailable_layers(&self) -> &[String] {
        &self.unavailable
    }

    /// Run all layers over one frame and report which ones degraded.
    pub fn analyze_frame(&self, frame: &Frame) -> FrameTextReport {
        let gray = frame.to_gray();
        let layers: Vec<Layer<'_>> = self
            .engines
            .iter()
            .map(|engine| Layer::Ocr(engine.as_ref()))
            .chain(self.heuristics.iter().copied().map(Layer::Heuristic))
            .collect();

        // Indexed collect keeps layer order regardless of completion order
        let results: Vec<(&'static str, MediaResult<Vec<Detection>>)> = layers
            .par_iter()
            .map(|layer| (layer.name(), self.run_layer(layer, frame, &gray)))
            .collect();

        let mut fused = Vec::new();
        let mut degraded = self.unavailable.clone();
        for (name, result) in results {
            match result {
                Ok(detections) => {
                    metrics::record_layer_detections(name, detections.len());
                    fused.extend(detections);
                }
                Err(e) => {
                    warn!(layer = name, frame_index = frame.index, error = %e, "Text layer failed");
                    metrics::record_layer_error(name);
                    if !degraded.iter().any(|d| d == name) {
                        degraded.push(name.to_string());
                    }
                }
            }
        }

        let valid: Vec<Detection> = fused.into_iter().filter(|d| self.is_valid_text(d)).collect();
        let detections = dedup_overlapping(valid);
        debug!(frame_index = frame.index, detections = detections.len(), "Text layers fused");

        FrameTextReport {
            detections,
            degraded,
        }
    }

    /// Deduplicated text detections for one frame.
    pub fn detect_text_in_frame(&self, frame: &Frame) -> Vec<Detection> {
        self.analyze_frame(frame).detections
    }

    /// Scan a video until the first frame with text.
    pub fn detect_text_in_video(
        &self,
        path: &Path,
        strategy: SampleStrategy,
        deadline: Option<&Deadline>,
    ) -> MediaResult<TextScan> {
        let mut source = self.opener.open(path, 0)?;
        let plan = ScanPlan::new(
            strategy.skip_interval(source.props().fps),
            self.sampling.max_processed_frames,
        )
        .with_deadline(deadline.cloned());
        debug!(path = %path.display(), skip = plan.skip, "Scanning for text");

        let mut degraded: Vec<String> = Vec::new();
        let outcome = scan_with_early_exit(source.as_mut(), plan, "text", |frame| {
            let report = self.analyze_frame(frame);
            for layer in report.degraded {
                if !degraded.contains(&layer) {
                    degraded.push(layer);
                }
            }
            report.detections
        })?;

        Ok(TextScan {
            detections: outcome.detections,
            frames_visited: outcome.frames_visited,
            degraded,
        })
    }

    fn is_valid_text(&self, detection: &Detection) -> bool {
        match detection.text_content() {
            Some(text) => {
                let trimmed = text.trim();
                !trimmed.is_empty() && trimmed.chars().count() >= self.config.min_text_length
            }
            None => false,
        }
    }

    fn run_layer(&self, layer: &Layer<'_>, frame: &Frame, gray: &GrayImage) -> MediaResult<Vec<Detection>> {
        match layer {
            Layer::Ocr(engine) => self.run_ocr(*engine, frame, gray),
            Layer::Heuristic(h) => run_heuristic(*h, frame, gray),
        }
    }

    fn run_ocr(&self, engine: &dyn OcrEngine, frame: &Frame, gray: &GrayImage) -> MediaResult<Vec<Detection>> {
        let (input, scale_back) = match engine.input() {
            OcrInput::Binarized => {
                let (binary, scale_back) = binarize_for_ocr(gray, self.config.ocr_max_width);
                (DynamicImage::ImageLuma8(binary), scale_back)
            }
            OcrInput::Color => (DynamicImage::ImageRgb8(frame.image.clone()), 1.0),
        };

        let words = engine.recognize(&input)?;
        Ok(words
            .into_iter()
            .filter(|w| w.confidence >= self.config.ocr_confidence)
            .map(|w| {
                // Report boxes in frame coordinates
                let bbox = if scale_back != 1.0 { w.bbox.scaled(scale_back) } else { w.bbox };
                Detection::text(bbox, w.confidence, engine.method(), w.text, frame.index, frame.timestamp)
            })
            .collect())
    }
}

fn load_tesseract(config: &TextConfig) -> MediaResult<Arc<dyn OcrEngine>> {
    Ok(Arc::new(TesseractEngine::new(config)?))
}

#[cfg(feature = "opencv")]
fn load_deep_ocr(config: &TextConfig, use_gpu: bool) -> MediaResult<Arc<dyn OcrEngine>> {
    Ok(Arc::new(DeepOcrEngine::new(config, use_gpu)?))
}

#[cfg(not(feature = "opencv"))]
fn load_deep_ocr(_config: &TextConfig, _use_gpu: bool) -> MediaResult<Arc<dyn OcrEngine>> {
    debug!("Neural OCR reader needs the opencv feature");
    Err(crate::error::MediaError::engine_unavailable(
        "deep_ocr",
        "built without the opencv feature",
    ))
}

#[cfg(feature = "opencv")]
fn run_heuristic(layer: HeuristicLayer, frame: &Frame, gray: &GrayImage) -> MediaResult<Vec<Detection>> {
    let boxes = heuristics::run(layer, gray)?;
    Ok(boxes
        .into_iter()
        .enumerate()
        .map(|(i, (bbox, method))| {
            Detection::text(
                bbox,
                layer.confidence(),
                method,
                format!("{}_{}", layer.label_prefix(), i),
                frame.index,
                frame.timestamp,
            )
        })
        .collect())
}

#[cfg(not(feature = "opencv"))]
fn run_heuristic(layer: HeuristicLayer, _frame: &Frame, _gray: &GrayImage) -> MediaResult<Vec<Detection>> {
    Err(crate::error::MediaError::engine_unavailable(
        layer.name(),
        "built without the opencv feature",
    ))
}
