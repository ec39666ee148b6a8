//! Identity of the ensemble's layers.

use reelsift_models::TextMethod;

/// The five vision heuristics run in `full` aggressiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeuristicLayer {
    /// Canny contours with text-like proportions
    Pattern,
    /// Multi-threshold Canny contours
    Edge,
    /// Gradient + Laplacian texture, multi-threshold
    AnyFont,
    /// Morphological edges for decorative type
    Stylized,
    /// Canny contours over 24 rotations
    Rotated,
}

impl HeuristicLayer {
    /// Fixed evaluation order.
    pub const ALL: [HeuristicLayer; 5] = [
        HeuristicLayer::Pattern,
        HeuristicLayer::Edge,
        HeuristicLayer::AnyFont,
        HeuristicLayer::Stylized,
        HeuristicLayer::Rotated,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            HeuristicLayer::Pattern => "pattern",
            HeuristicLayer::Edge => "edge",
            HeuristicLayer::AnyFont => "any_font",
            HeuristicLayer::Stylized => "stylized",
            HeuristicLayer::Rotated => "rotated",
        }
    }

    /// Prefix of the synthetic text label, numbered per frame.
    pub fn label_prefix(&self) -> &'static str {
        match self {
            HeuristicLayer::Pattern => "PATTERN",
            HeuristicLayer::Edge => "EDGE",
            HeuristicLayer::AnyFont => "FONT",
            HeuristicLayer::Stylized => "STYLIZED",
            HeuristicLayer::Rotated => "ROTATED",
        }
    }

    /// Fixed confidence reported for every box of this layer.
    pub fn confidence(&self) -> f32 {
        match self {
            HeuristicLayer::Pattern => 0.8,
            HeuristicLayer::Edge => 0.7,
            HeuristicLayer::AnyFont => 0.9,
            HeuristicLayer::Stylized => 0.8,
            HeuristicLayer::Rotated => 0.85,
        }
    }

    /// Method tag; rotated boxes carry their own angle instead.
    pub fn method(&self) -> TextMethod {
        match self {
            HeuristicLayer::Pattern => TextMethod::Pattern,
            HeuristicLayer::Edge => TextMethod::Edge,
            HeuristicLayer::AnyFont => TextMethod::AnyFont,
            HeuristicLayer::Stylized => TextMethod::Stylized,
            HeuristicLayer::Rotated => TextMethod::Rotated { angle: 0 },
        }
    }
}
