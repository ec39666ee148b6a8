//! Visual findings produced by the face and text detectors.
//!
//! A [`Detection`] is created by exactly one detector call on one frame. Text-only
//! fields live on the [`DetectionKind::Text`] variant so a face can never carry a
//! recognized string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::rect::PixelBox;

/// One visual finding in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Box in pixel coordinates of the (possibly downscaled) frame
    pub bbox: PixelBox,
    /// Normalized score in [0, 1]
    pub confidence: f32,
    /// What was found
    #[serde(flatten)]
    pub kind: DetectionKind,
    /// Index of the source frame within the video
    pub frame_index: u64,
    /// Presentation time of the source frame
    pub timestamp_seconds: f64,
}

/// Tagged detection payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionKind {
    /// A face from the object-detection model.
    Face,
    /// A text region from one ensemble layer.
    Text {
        /// Layer that produced it
        method: TextMethod,
        /// Recognized text, or a synthetic label for heuristic layers
        text: String,
    },
}

impl Detection {
    /// Create a face detection.
    pub fn face(bbox: PixelBox, confidence: f32, frame_index: u64, timestamp_seconds: f64) -> Self {
        Self {
            bbox,
            confidence: confidence.clamp(0.0, 1.0),
            kind: DetectionKind::Face,
            frame_index,
            timestamp_seconds,
        }
    }

    /// Create a text detection.
    pub fn text(
        bbox: PixelBox,
        confidence: f32,
        method: TextMethod,
        text: impl Into<String>,
        frame_index: u64,
        timestamp_seconds: f64,
    ) -> Self {
        Self {
            bbox,
            confidence: confidence.clamp(0.0, 1.0),
            kind: DetectionKind::Text {
                method,
                text: text.into(),
            },
            frame_index,
            timestamp_seconds,
        }
    }

    /// Returns true for face detections.
    pub fn is_face(&self) -> bool {
        matches!(self.kind, DetectionKind::Face)
    }

    /// Recognized text, if this is a text detection.
    pub fn text_content(&self) -> Option<&str> {
        match &self.kind {
            DetectionKind::Text { text, .. } => Some(text),
            DetectionKind::Face => None,
        }
    }

    /// Producing text layer, if this is a text detection.
    pub fn text_method(&self) -> Option<TextMethod> {
        match &self.kind {
            DetectionKind::Text { method, .. } => Some(*method),
            DetectionKind::Face => None,
        }
    }
}

/// Which text layer produced a detection.
///
/// Wire names match the report vocabulary: the deep OCR reader is `easyocr`,
/// rotated contours are `rotated_<angle>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TextMethod {
    /// Tesseract CLI over the binarized frame.
    Tesseract,
    /// Neural text detector + recognizer.
    DeepOcr,
    /// Single-threshold Canny contours.
    Pattern,
    /// Multi-threshold Canny contours.
    Edge,
    /// Gradient/texture fusion with multiple binarizations.
    AnyFont,
    /// Morphology-enhanced contours for decorative fonts.
    Stylized,
    /// Contours found after rotating the frame by `angle` degrees.
    Rotated { angle: u16 },
}

impl TextMethod {
    /// Returns the method name as a string.
    pub fn as_str(&self) -> std::borrow::Cow<'static, str> {
        use std::borrow::Cow;
        match self {
            TextMethod::Tesseract => Cow::Borrowed("tesseract"),
            TextMethod::DeepOcr => Cow::Borrowed("easyocr"),
            TextMethod::Pattern => Cow::Borrowed("pattern"),
            TextMethod::Edge => Cow::Borrowed("edge"),
            TextMethod::AnyFont => Cow::Borrowed("any_font"),
            TextMethod::Stylized => Cow::Borrowed("stylized"),
            TextMethod::Rotated { angle } => Cow::Owned(format!("rotated_{}", angle)),
        }
    }

    /// Returns true for the two OCR engines (as opposed to vision heuristics).
    pub fn is_ocr(&self) -> bool {
        matches!(self, TextMethod::Tesseract | TextMethod::DeepOcr)
    }
}

impl fmt::Display for TextMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl FromStr for TextMethod {
    type Err = TextMethodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tesseract" => Ok(TextMethod::Tesseract),
            "easyocr" | "deep_ocr" => Ok(TextMethod::DeepOcr),
            "pattern" => Ok(TextMethod::Pattern),
            "edge" => Ok(TextMethod::Edge),
            "any_font" => Ok(TextMethod::AnyFont),
            "stylized" => Ok(TextMethod::Stylized),
            other => other
                .strip_prefix("rotated_")
                .and_then(|a| a.parse::<u16>().ok())
                .filter(|a| *a < 360)
                .map(|angle| TextMethod::Rotated { angle })
                .ok_or_else(|| TextMethodParseError(s.to_string())),
        }
    }
}

impl From<TextMethod> for String {
    fn from(method: TextMethod) -> Self {
        method.as_str().into_owned()
    }
}

impl TryFrom<String> for TextMethod {
    type Error = TextMethodParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Error)]
#[error("Unknown text method: {0}")]
pub struct TextMethodParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox() -> PixelBox {
        PixelBox::new(1, 2, 30, 40).unwrap()
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("tesseract".parse::<TextMethod>().unwrap(), TextMethod::Tesseract);
        assert_eq!("easyocr".parse::<TextMethod>().unwrap(), TextMethod::DeepOcr);
        assert_eq!(
            "rotated_45".parse::<TextMethod>().unwrap(),
            TextMethod::Rotated { angle: 45 }
        );
        assert!("rotated_".parse::<TextMethod>().is_err());
        assert!("rotated_400".parse::<TextMethod>().is_err());
        assert!("ocr".parse::<TextMethod>().is_err());
    }

    #[test]
    fn test_method_display() {
        assert_eq!(TextMethod::AnyFont.to_string(), "any_font");
        assert_eq!(TextMethod::Rotated { angle: 330 }.to_string(), "rotated_330");
    }

    #[test]
    fn test_face_serialization_has_no_text_fields() {
        let det = Detection::face(bbox(), 0.9, 45, 1.5);
        let json = serde_json::to_value(&det).unwrap();

        assert_eq!(json["kind"], "face");
        assert!(json.get("text").is_none());
        assert!(json.get("method").is_none());
        assert_eq!(json["frame_index"], 45);
    }

    #[test]
    fn test_text_detection_json() {
        let det = Detection::text(bbox(), 0.85, TextMethod::Rotated { angle: 15 }, "ROTATED_0", 3, 0.1);
        let json = serde_json::to_string(&det).unwrap();
        assert!(json.contains(r#""kind":"text""#));
        assert!(json.contains(r#""method":"rotated_15""#));

        let back: Detection = serde_json::from_str(&json).unwrap();
        assert_eq!(back.text_method(), Some(TextMethod::Rotated { angle: 15 }));
        assert_eq!(back.text_content(), Some("ROTATED_0"));
    }

    #[test]
    fn test_confidence_clamped() {
        let det = Detection::face(bbox(), 1.7, 0, 0.0);
        assert_eq!(det.confidence, 1.0);
        assert!(det.is_face());
        assert!(det.text_content().is_none());
    }
}
