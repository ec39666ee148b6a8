//! OCR engine seam.

use image::DynamicImage;
use reelsift_models::{PixelBox, TextMethod};

use crate::error::MediaResult;

/// One recognized word or line.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    /// Box in the coordinates of the image passed to the engine
    pub bbox: PixelBox,
    pub text: String,
    /// Normalized to `[0, 1]`
    pub confidence: f32,
}

/// What an engine wants to be fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrInput {
    /// Width-capped, blurred and adaptively thresholded grayscale
    Binarized,
    /// The full-resolution RGB frame
    Color,
}

/// A text recognizer: image in, words with boxes out.
#[cfg_attr(test, mockall::automock)]
pub trait OcrEngine: Send + Sync {
    /// Layer name used in logs, metrics and `degraded` lists.
    fn name(&self) -> &'static str;

    /// Method tag stamped on this engine's detections.
    fn method(&self) -> TextMethod;

    fn input(&self) -> OcrInput;

    fn recognize(&self, image: &DynamicImage) -> MediaResult<Vec<OcrWord>>;
}
