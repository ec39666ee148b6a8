//! OCR input preparation.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};

/// Sigma of the 3x3 smoothing pass applied before thresholding.
const SMOOTH_SIGMA: f32 = 0.8;

/// Sigma of the Gaussian-weighted local mean (an 11x11 window).
const LOCAL_MEAN_SIGMA: f32 = 2.0;

/// Constant subtracted from the local mean.
const THRESHOLD_C: i16 = 2;

/// Shrink `gray` so it is at most `max_width` wide.
///
/// Returns the image and the factor that maps its coordinates back to the
/// input (1.0 when no resize happened).
pub fn cap_width(gray: &GrayImage, max_width: u32) -> (GrayImage, f64) {
    let (width, height) = gray.dimensions();
    if max_width == 0 || width <= max_width {
        return (gray.clone(), 1.0);
    }
    let scale = max_width as f64 / width as f64;
    let new_height = ((height as f64 * scale).round() as u32).max(1);
    let resized = imageops::resize(gray, max_width, new_height, FilterType::Triangle);
    (resized, width as f64 / max_width as f64)
}

/// Adaptive Gaussian threshold: a pixel is white when it is brighter than
/// its local weighted mean minus [`THRESHOLD_C`].
pub fn adaptive_threshold(gray: &GrayImage) -> GrayImage {
    let local = imageops::blur(gray, LOCAL_MEAN_SIGMA);
    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let mean = local.get_pixel(x, y)[0] as i16;
        let value = if pixel[0] as i16 > mean - THRESHOLD_C { 255 } else { 0 };
        out.put_pixel(x, y, Luma([value]));
    }
    out
}

/// Full Tesseract preparation: width cap, light blur, adaptive threshold.
///
/// Returns the binarized image and the factor mapping its coordinates back
/// to the original frame.
pub fn binarize_for_ocr(gray: &GrayImage, max_width: u32) -> (GrayImage, f64) {
    let (capped, scale_back) = cap_width(gray, max_width);
    let smoothed = imageops::blur(&capped, SMOOTH_SIGMA);
    (adaptive_threshold(&smoothed), scale_back)
}
