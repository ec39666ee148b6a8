//! Decoded video frames.

use image::{GrayImage, RgbImage};

/// One decoded frame with its position in the source video.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Zero-based frame index
    pub index: u64,
    /// Presentation time in seconds
    pub timestamp: f64,
    /// RGB pixels
    pub image: RgbImage,
}

impl Frame {
    /// Create a frame.
    pub fn new(index: u64, timestamp: f64, image: RgbImage) -> Self {
        Self {
            index,
            timestamp,
            image,
        }
    }

    /// Build a frame from packed rgb24 bytes.
    pub fn from_rgb24(index: u64, timestamp: f64, width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(|image| Self::new(index, timestamp, image))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Luma conversion.
    pub fn to_gray(&self) -> GrayImage {
        image::imageops::grayscale(&self.image)
    }
}

/// Presentation time of `index` at `fps` (0 when fps is unknown).
pub fn timestamp_for(index: u64, fps: f64) -> f64 {
    if fps > 0.0 {
        index as f64 / fps
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgb24_checks_length() {
        assert!(Frame::from_rgb24(0, 0.0, 2, 2, vec![0; 12]).is_some());
        assert!(Frame::from_rgb24(0, 0.0, 2, 2, vec![0; 11]).is_none());
    }

    #[test]
    fn test_timestamp_for() {
        assert!((timestamp_for(45, 30.0) - 1.5).abs() < 1e-9);
        assert_eq!(timestamp_for(45, 0.0), 0.0);
    }
}
