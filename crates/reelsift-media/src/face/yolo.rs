//! YOLOv8-format ONNX detector.
//!
//! Runs with automatic execution provider selection:
//! - CUDA on Linux with NVIDIA GPU (when the `cuda` feature is enabled and GPU use is requested)
//! - CoreML on macOS
//! - CPU fallback on all platforms
//!
//! Output layout is `[1, 4 + num_classes, num_candidates]`; the class count is
//! read from the tensor shape so single-class face models and 80-class COCO
//! models both work.

use image::RgbImage;
use ndarray::ArrayView2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use super::model::{InferenceModel, RawDetection};
use crate::config::FaceConfig;
use crate::error::{MediaError, MediaResult};

/// Face model backed by ONNX Runtime.
pub struct YoloModel {
    session: Mutex<Session>,
    input_size: u32,
    nms_threshold: f32,
    label: String,
}

impl YoloModel {
    /// Load the model configured in `config`.
    ///
    /// Returns error if the model file doesn't exist or cannot be loaded.
    pub fn new(config: &FaceConfig, use_gpu: bool) -> MediaResult<Self> {
        let model_path = config.model_path.as_path();
        if !model_path.exists() {
            return Err(MediaError::model_not_found(model_path.display().to_string()));
        }

        let session = Mutex::new(create_session(model_path, use_gpu)?);
        let label = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "yolo".to_string());

        info!(
            model_path = %model_path.display(),
            input_size = config.input_size,
            "Face model initialized"
        );

        Ok(Self {
            session,
            input_size: config.input_size,
            nms_threshold: config.nms_threshold,
            label,
        })
    }

    /// Resize to the square model input, normalize to [0, 1], NCHW layout.
    fn preprocess(&self, img: &RgbImage) -> MediaResult<Value> {
        let size = self.input_size;
        let resized = image::imageops::resize(img, size, size, image::imageops::FilterType::Triangle);
        let (w, h) = (size as usize, size as usize);

        let mut chw_data: Vec<f32> = vec![0.0; 3 * h * w];
        for (x, y, pixel) in resized.enumerate_pixels() {
            let offset = y as usize * w + x as usize;
            for c in 0..3 {
                chw_data[c * h * w + offset] = pixel[c] as f32 / 255.0;
            }
        }

        let shape = vec![1usize, 3, h, w];
        Tensor::from_array((shape, chw_data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| MediaError::inference_failed(format!("Failed to create tensor: {}", e)))
    }

    /// Run ONNX inference, returning `(features, candidates, data)`.
    fn run_inference(&self, input: Value) -> MediaResult<(usize, usize, Vec<f32>)> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::inference_failed(format!("ONNX inference failed: {}", e)))?;

        let output = outputs
            .get("output0")
            .ok_or_else(|| MediaError::inference_failed("Missing output0 tensor"))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::inference_failed(format!("Failed to extract tensor: {}", e)))?;

        let dims: Vec<i64> = shape.iter().copied().collect();
        let (features, candidates) = match dims.as_slice() {
            [1, f, n] | [f, n] if *f > 4 && *n > 0 => (*f as usize, *n as usize),
            other => {
                return Err(MediaError::inference_failed(format!(
                    "Unexpected output shape: {:?}",
                    other
                )))
            }
        };

        Ok((features, candidates, data.to_vec()))
    }
}

impl InferenceModel for YoloModel {
    fn infer(&self, image: &RgbImage, confidence_floor: f32) -> MediaResult<Vec<RawDetection>> {
        let input = self.preprocess(image)?;
        let (features, candidates, data) = self.run_inference(input)?;
        let detections = decode_output(
            &data,
            features,
            candidates,
            self.input_size,
            image.width(),
            image.height(),
            confidence_floor,
            self.nms_threshold,
        )?;
        debug!(count = detections.len(), "Face model inference completed");
        Ok(detections)
    }

    fn name(&self) -> String {
        self.label.clone()
    }
}

/// Decode a `[features, candidates]` YOLOv8 output into pixel-space boxes.
///
/// Each candidate column is `cx, cy, w, h, score_0 .. score_{n-1}` in model
/// input coordinates. Boxes below `confidence_floor` are dropped, the rest go
/// through per-class NMS.
#[allow(clippy::too_many_arguments)]
pub(crate) fn decode_output(
    data: &[f32],
    features: usize,
    candidates: usize,
    input_size: u32,
    orig_width: u32,
    orig_height: u32,
    confidence_floor: f32,
    nms_threshold: f32,
) -> MediaResult<Vec<RawDetection>> {
    if features <= 4 {
        return Err(MediaError::inference_failed(format!(
            "Output has no class scores ({} features)",
            features
        )));
    }
    let output = ArrayView2::from_shape((features, candidates), data)
        .map_err(|e| MediaError::inference_failed(format!("Failed to reshape output: {}", e)))?;
    let transposed = output.t();

    let num_classes = features - 4;
    let scale_w = orig_width as f32 / input_size as f32;
    let scale_h = orig_height as f32 / input_size as f32;
    let max_x = orig_width as f32;
    let max_y = orig_height as f32;

    let mut boxes = Vec::new();
    for row in transposed.outer_iter() {
        let (best_class, best_score) = (0..num_classes)
            .map(|c| (c, row[4 + c]))
            .fold((0usize, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

        if best_score < confidence_floor {
            continue;
        }

        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
        let x1 = ((cx - w / 2.0) * scale_w).clamp(0.0, max_x);
        let y1 = ((cy - h / 2.0) * scale_h).clamp(0.0, max_y);
        let x2 = ((cx + w / 2.0) * scale_w).clamp(0.0, max_x);
        let y2 = ((cy + h / 2.0) * scale_h).clamp(0.0, max_y);

        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        boxes.push(RawDetection {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            class_id: best_class,
            confidence: best_score,
        });
    }

    Ok(non_maximum_suppression(boxes, nms_threshold))
}

/// Per-class NMS, highest confidence first.
pub(crate) fn non_maximum_suppression(
    mut detections: Vec<RawDetection>,
    iou_threshold: f32,
) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<RawDetection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let suppressed = keep
            .iter()
            .any(|k| k.class_id == candidate.class_id && k.iou(&candidate) > iou_threshold);
        if !suppressed {
            keep.push(candidate);
        }
    }
    keep
}

/// Create ONNX Runtime session with automatic execution provider selection.
fn create_session(model_path: &Path, use_gpu: bool) -> MediaResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| MediaError::internal(format!("Failed to read model file: {}", e)))?;

    let mut builder = Session::builder()
        .map_err(|e| MediaError::internal(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MediaError::internal(format!("Failed to set optimization level: {}", e)))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if use_gpu {
            if let Ok(cuda_builder) = builder
                .clone()
                .with_execution_providers([CUDAExecutionProvider::default().build()])
            {
                if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                    info!("Using CUDA execution provider for face detection");
                    return Ok(session);
                }
            }
            debug!("CUDA execution provider not available, trying alternatives");
        }
    }
    #[cfg(not(all(target_os = "linux", feature = "cuda")))]
    {
        if use_gpu {
            debug!("GPU requested but this build has no CUDA support");
        }
    }

    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!("Using CoreML execution provider for face detection");
                return Ok(session);
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    info!("Using CPU execution provider for face detection");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| MediaError::internal(format!("Failed to load ONNX model: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a `[features, candidates]` buffer from per-candidate columns.
    fn columns(cols: &[Vec<f32>]) -> (Vec<f32>, usize, usize) {
        let features = cols[0].len();
        let candidates = cols.len();
        let mut data = vec![0.0; features * candidates];
        for (n, col) in cols.iter().enumerate() {
            for (f, v) in col.iter().enumerate() {
                data[f * candidates + n] = *v;
            }
        }
        (data, features, candidates)
    }

    #[test]
    fn test_decode_single_class_scales_to_original() {
        // One face centered at (320, 320) of size 64x64 in a 640 input
        let (data, f, n) = columns(&[vec![320.0, 320.0, 64.0, 64.0, 0.9], vec![10.0, 10.0, 4.0, 4.0, 0.1]]);
        let out = decode_output(&data, f, n, 640, 1280, 1280, 0.25, 0.45).unwrap();

        assert_eq!(out.len(), 1);
        let d = out[0];
        assert_eq!(d.class_id, 0);
        assert!((d.x - 576.0).abs() < 1e-3);
        assert!((d.width - 128.0).abs() < 1e-3);
    }

    #[test]
    fn test_decode_picks_best_class() {
        let (data, f, n) = columns(&[vec![100.0, 100.0, 20.0, 20.0, 0.2, 0.8, 0.1]]);
        let out = decode_output(&data, f, n, 640, 640, 640, 0.25, 0.45).unwrap();
        assert_eq!(out[0].class_id, 1);
        assert!((out[0].confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_decode_rejects_bad_shape() {
        assert!(decode_output(&[0.0; 10], 5, 3, 640, 640, 640, 0.25, 0.45).is_err());
    }

    #[test]
    fn test_nms_keeps_best_per_class() {
        let a = RawDetection { x: 0.0, y: 0.0, width: 10.0, height: 10.0, class_id: 0, confidence: 0.9 };
        let b = RawDetection { confidence: 0.8, x: 1.0, ..a };
        let c = RawDetection { class_id: 1, ..b };

        let kept = non_maximum_suppression(vec![b, a, c], 0.45);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!(kept[1].class_id, 1);
    }
}
