//! Box conversions shared by the text layers.

use reelsift_models::PixelBox;

/// Axis-aligned box spanned by corners 0 and 2 of a text polygon.
///
/// Detectors emit quadrilaterals with opposite corners at indices 0 and 2.
/// Returns `None` for polygons with fewer than three points or no area.
pub fn polygon_to_bbox(points: &[(f32, f32)]) -> Option<PixelBox> {
    let (a, c) = match points {
        [a, _, c, ..] => (*a, *c),
        _ => return None,
    };
    if !(a.0.is_finite() && a.1.is_finite() && c.0.is_finite() && c.1.is_finite()) {
        return None;
    }
    let left = a.0.min(c.0).round() as i64;
    let top = a.1.min(c.1).round() as i64;
    let right = a.0.max(c.0).round() as i64;
    let bottom = a.1.max(c.1).round() as i64;
    PixelBox::from_signed(left, top, right - left, bottom - top)
}

/// Map a box found in an image rotated by `angle_deg` (counter-clockwise,
/// about the image centre, same canvas size) back to the unrotated image.
///
/// The result is the axis-aligned hull of the four inverse-rotated corners,
/// clipped to `width x height`.
pub fn unrotate_box(bbox: &PixelBox, angle_deg: f64, width: u32, height: u32) -> Option<PixelBox> {
    if angle_deg % 360.0 == 0.0 {
        return Some(*bbox);
    }
    let cx = (width / 2) as f64;
    let cy = (height / 2) as f64;
    // Inverse of a counter-clockwise rotation in image coordinates (y down)
    let (sin, cos) = (-angle_deg).to_radians().sin_cos();
    // Keep exact quarter turns on whole pixels
    let snap = |v: f64| (v * 1e6).round() / 1e6;

    let corners = [
        (bbox.x as f64, bbox.y as f64),
        (bbox.right() as f64, bbox.y as f64),
        (bbox.x as f64, bbox.bottom() as f64),
        (bbox.right() as f64, bbox.bottom() as f64),
    ];

    let mut min_x = f64::MAX;
    let mut min_y = f64::MAX;
    let mut max_x = f64::MIN;
    let mut max_y = f64::MIN;
    for (x, y) in corners {
        let dx = x - cx;
        let dy = y - cy;
        let ox = snap(cos * dx + sin * dy + cx);
        let oy = snap(-sin * dx + cos * dy + cy);
        min_x = min_x.min(ox);
        min_y = min_y.min(oy);
        max_x = max_x.max(ox);
        max_y = max_y.max(oy);
    }

    let left = min_x.max(0.0).floor();
    let top = min_y.max(0.0).floor();
    let right = max_x.min(width as f64).ceil();
    let bottom = max_y.min(height as f64).ceil();
    if right <= left || bottom <= top {
        return None;
    }
    PixelBox::new(left as u32, top as u32, (right - left) as u32, (bottom - top) as u32)
}
