//! `image` <-> OpenCV `Mat` conversions and contour helpers.

use image::{GrayImage, RgbImage};
use opencv::core::{Mat, Point, Vec3b, VecN, Vector};
use opencv::imgproc;
use opencv::prelude::MatTraitConst;
use reelsift_models::PixelBox;

use crate::error::MediaResult;

/// Copy a grayscale image into a single-channel `CV_8U` Mat.
pub fn gray_to_mat(gray: &GrayImage) -> MediaResult<Mat> {
    let view = Mat::new_rows_cols_with_data(gray.height() as i32, gray.width() as i32, gray.as_raw())?;
    Ok(view.try_clone()?)
}

/// Copy an RGB image into a BGR `CV_8UC3` Mat.
pub fn rgb_to_bgr_mat(rgb: &RgbImage) -> MediaResult<Mat> {
    let pixels: Vec<Vec3b> = rgb.pixels().map(|p| VecN([p[2], p[1], p[0]])).collect();
    let view = Mat::new_rows_cols_with_data(rgb.height() as i32, rgb.width() as i32, &pixels)?;
    Ok(view.try_clone()?)
}

/// Bounding boxes of external contours in a binary image.
///
/// A contour is kept when its polygon area exceeds `min_area` and `keep`
/// accepts its bounding box.
pub fn contour_boxes<F>(binary: &Mat, min_area: f64, keep: F) -> MediaResult<Vec<PixelBox>>
where
    F: Fn(&PixelBox) -> bool,
{
    let mut contours: Vector<Vector<Point>> = Vector::new();
    imgproc::find_contours_def(
        binary,
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_SIMPLE,
    )?;

    let mut boxes = Vec::new();
    for contour in contours.iter() {
        if imgproc::contour_area_def(&contour)? <= min_area {
            continue;
        }
        let rect = imgproc::bounding_rect(&contour)?;
        if let Some(bbox) = PixelBox::from_signed(
            rect.x as i64,
            rect.y as i64,
            rect.width as i64,
            rect.height as i64,
        ) {
            if keep(&bbox) {
                boxes.push(bbox);
            }
        }
    }
    Ok(boxes)
}
