use serde::{Deserialize, Serialize};

/// An axis-aligned box in pixel coordinates of the frame it was found in.
///
/// Width and height are always positive: a zero-area box cannot be constructed,
/// neither through [`PixelBox::new`] nor through deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBox")]
pub struct PixelBox {
    /// X coordinate of the top-left corner
    pub x: u32,
    /// Y coordinate of the top-left corner
    pub y: u32,
    /// Width in pixels (> 0)
    pub width: u32,
    /// Height in pixels (> 0)
    pub height: u32,
}

#[derive(Deserialize)]
struct RawBox {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl TryFrom<RawBox> for PixelBox {
    type Error = String;

    fn try_from(raw: RawBox) -> Result<Self, Self::Error> {
        PixelBox::new(raw.x, raw.y, raw.width, raw.height)
            .ok_or_else(|| format!("zero-area box {}x{}", raw.width, raw.height))
    }
}

impl PixelBox {
    /// Create a box, returning `None` when either side is zero.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Create a box from signed coordinates as produced by detectors.
    ///
    /// Negative origins are clamped to the frame edge (shrinking the box by
    /// the clipped amount). Returns `None` if nothing positive remains.
    pub fn from_signed(x: i64, y: i64, width: i64, height: i64) -> Option<Self> {
        let (x, width) = clamp_axis(x, width);
        let (y, height) = clamp_axis(y, height);
        Self::new(to_u32(x), to_u32(y), to_u32(width), to_u32(height))
    }

    /// Area in square pixels.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Right edge (exclusive).
    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Bottom edge (exclusive).
    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// Width over height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Area of the intersection with `other` (0 when disjoint).
    pub fn overlap_area(&self, other: &PixelBox) -> u64 {
        let left = self.x.max(other.x) as u64;
        let top = self.y.max(other.y) as u64;
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= left || bottom <= top {
            return 0;
        }
        (right - left) * (bottom - top)
    }

    /// Scale all coordinates by `factor`, keeping at least one pixel per side.
    pub fn scaled(&self, factor: f64) -> PixelBox {
        let scale = |v: u32| (v as f64 * factor).round().max(0.0) as u32;
        PixelBox {
            x: scale(self.x),
            y: scale(self.y),
            width: scale(self.width).max(1),
            height: scale(self.height).max(1),
        }
    }
}

fn clamp_axis(origin: i64, extent: i64) -> (i64, i64) {
    if origin < 0 {
        (0, extent + origin)
    } else {
        (origin, extent)
    }
}

fn to_u32(v: i64) -> u32 {
    v.clamp(0, u32::MAX as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_area_rejected() {
        assert!(PixelBox::new(0, 0, 0, 10).is_none());
        assert!(PixelBox::new(0, 0, 10, 0).is_none());
        assert!(PixelBox::new(5, 5, 1, 1).is_some());
    }

    #[test]
    fn test_from_signed_clamps_origin() {
        let b = PixelBox::from_signed(-4, 2, 10, 6).unwrap();
        assert_eq!(b, PixelBox::new(0, 2, 6, 6).unwrap());
        assert!(PixelBox::from_signed(-10, 0, 10, 10).is_none());
        assert!(PixelBox::from_signed(0, 0, -3, 5).is_none());
    }

    #[test]
    fn test_overlap_area() {
        let a = PixelBox::new(0, 0, 100, 100).unwrap();
        let b = PixelBox::new(10, 10, 100, 100).unwrap();
        let c = PixelBox::new(200, 200, 50, 50).unwrap();

        assert_eq!(a.overlap_area(&b), 90 * 90);
        assert_eq!(b.overlap_area(&a), 90 * 90);
        assert_eq!(a.overlap_area(&c), 0);
        assert_eq!(a.overlap_area(&a), a.area());
    }

    #[test]
    fn test_touching_edges_do_not_overlap() {
        let a = PixelBox::new(0, 0, 10, 10).unwrap();
        let b = PixelBox::new(10, 0, 10, 10).unwrap();
        assert_eq!(a.overlap_area(&b), 0);
    }

    #[test]
    fn test_deserialize_rejects_zero_area() {
        let ok: PixelBox =
            serde_json::from_str(r#"{"x":1,"y":2,"width":3,"height":4}"#).unwrap();
        assert_eq!(ok.area(), 12);

        let bad = serde_json::from_str::<PixelBox>(r#"{"x":1,"y":2,"width":0,"height":4}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_scaled() {
        let b = PixelBox::new(10, 20, 30, 40).unwrap().scaled(0.5);
        assert_eq!(b, PixelBox::new(5, 10, 15, 20).unwrap());

        let tiny = PixelBox::new(0, 0, 1, 1).unwrap().scaled(0.1);
        assert_eq!(tiny.width, 1);
        assert_eq!(tiny.height, 1);
    }
}
