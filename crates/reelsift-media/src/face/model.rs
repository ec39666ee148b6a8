//! Inference seam for the face detector.

use image::RgbImage;
use std::fmt;
use std::sync::Arc;

use crate::config::FaceConfig;
use crate::error::MediaResult;

use super::yolo::YoloModel;

/// One raw box from the model, in pixel coordinates of the input image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub class_id: usize,
    pub confidence: f32,
}

impl RawDetection {
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &RawDetection) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// An object-detection model: image in, class-tagged boxes out.
#[cfg_attr(test, mockall::automock)]
pub trait InferenceModel: Send + Sync {
    /// Run the model, returning boxes with confidence >= `confidence_floor`.
    fn infer(&self, image: &RgbImage, confidence_floor: f32) -> MediaResult<Vec<RawDetection>>;

    /// Short name for logs.
    fn name(&self) -> String;
}

/// Shared handle to a loaded model.
///
/// Loading happens once at startup; every detector and worker clones the
/// handle instead of reloading weights.
#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<dyn InferenceModel>,
}

impl ModelHandle {
    /// Load the configured YOLO face model.
    pub fn load(config: &FaceConfig, use_gpu: bool) -> MediaResult<Self> {
        let model = YoloModel::new(config, use_gpu)?;
        Ok(Self::from_model(Arc::new(model)))
    }

    /// Wrap an already constructed model.
    pub fn from_model(model: Arc<dyn InferenceModel>) -> Self {
        Self { inner: model }
    }

    pub fn infer(&self, image: &RgbImage, confidence_floor: f32) -> MediaResult<Vec<RawDetection>> {
        self.inner.infer(image, confidence_floor)
    }

    pub fn name(&self) -> String {
        self.inner.name()
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("model", &self.inner.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(x: f32, y: f32, w: f32, h: f32) -> RawDetection {
        RawDetection {
            x,
            y,
            width: w,
            height: h,
            class_id: 0,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_iou() {
        let a = raw(0.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);

        let b = raw(5.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);

        let c = raw(20.0, 20.0, 5.0, 5.0);
        assert_eq!(a.iou(&c), 0.0);
    }

    #[test]
    fn test_handle_delegates() {
        let mut model = MockInferenceModel::new();
        model.expect_name().return_const("mock".to_string());
        model
            .expect_infer()
            .times(1)
            .returning(|_, _| Ok(vec![raw(1.0, 2.0, 3.0, 4.0)]));

        let handle = ModelHandle::from_model(Arc::new(model));
        let out = handle.infer(&RgbImage::new(4, 4), 0.5).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(handle.name(), "mock");
    }
}
