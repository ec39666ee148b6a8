//! Vision heuristics for text-like regions.
//!
//! Each layer is a pure function of the grayscale frame returning candidate
//! boxes in frame coordinates. None of them reads text; they are tuned for
//! recall and flag plenty of non-text structure.

use image::GrayImage;
use opencv::core::{self, Mat, Point2f, Scalar, Size, BORDER_CONSTANT, BORDER_DEFAULT, CV_64F};
use opencv::imgproc;
use opencv::prelude::MatTraitConst;
use reelsift_models::{PixelBox, TextMethod};

use super::cv::{contour_boxes, gray_to_mat};
use super::geometry::unrotate_box;
use super::layer::HeuristicLayer;
use crate::error::MediaResult;

/// Rotation step for the rotated layer, degrees.
const ROTATION_STEP: u16 = 15;

/// Run one heuristic layer over a grayscale frame.
pub fn run(layer: HeuristicLayer, gray: &GrayImage) -> MediaResult<Vec<(PixelBox, TextMethod)>> {
    let mat = gray_to_mat(gray)?;
    let tag = |boxes: Vec<PixelBox>| -> Vec<(PixelBox, TextMethod)> {
        boxes.into_iter().map(|b| (b, layer.method())).collect()
    };

    Ok(match layer {
        HeuristicLayer::Pattern => tag(pattern(&mat)?),
        HeuristicLayer::Edge => tag(edge(&mat)?),
        HeuristicLayer::AnyFont => tag(any_font(&mat)?),
        HeuristicLayer::Stylized => tag(stylized(&mat)?),
        HeuristicLayer::Rotated => rotated(&mat, gray.width(), gray.height())?,
    })
}

fn canny(src: &Mat, low: f64, high: f64) -> MediaResult<Mat> {
    let mut edges = Mat::default();
    imgproc::canny_def(src, &mut edges, low, high)?;
    Ok(edges)
}

/// OR-combined Canny maps for several threshold pairs.
fn canny_union(src: &Mat, thresholds: &[(f64, f64)]) -> MediaResult<Mat> {
    let mut combined = Mat::default();
    for (i, (low, high)) in thresholds.iter().enumerate() {
        let edges = canny(src, *low, *high)?;
        if i == 0 {
            combined = edges;
        } else {
            let mut merged = Mat::default();
            core::bitwise_or_def(&combined, &edges, &mut merged)?;
            combined = merged;
        }
    }
    Ok(combined)
}

fn pattern(gray: &Mat) -> MediaResult<Vec<PixelBox>> {
    let edges = canny(gray, 50.0, 150.0)?;
    contour_boxes(&edges, 50.0, |b| {
        let ratio = b.aspect_ratio();
        ratio > 0.1 && ratio < 10.0 && b.width > 5 && b.height > 5
    })
}

fn edge(gray: &Mat) -> MediaResult<Vec<PixelBox>> {
    let edges = canny_union(gray, &[(30.0, 100.0), (50.0, 150.0), (100.0, 200.0)])?;
    contour_boxes(&edges, 25.0, |b| b.width > 3 && b.height > 3)
}

fn any_font(gray: &Mat) -> MediaResult<Vec<PixelBox>> {
    let mut grad_x = Mat::default();
    let mut grad_y = Mat::default();
    imgproc::sobel_def(gray, &mut grad_x, CV_64F, 1, 0)?;
    imgproc::sobel_def(gray, &mut grad_y, CV_64F, 0, 1)?;
    let mut magnitude = Mat::default();
    core::magnitude(&grad_x, &grad_y, &mut magnitude)?;
    let mut gradient = Mat::default();
    core::convert_scale_abs_def(&magnitude, &mut gradient)?;

    let mut lap = Mat::default();
    imgproc::laplacian_def(gray, &mut lap, CV_64F)?;
    let mut laplacian = Mat::default();
    core::convert_scale_abs_def(&lap, &mut laplacian)?;

    let mut tex = Mat::default();
    imgproc::laplacian(gray, &mut tex, CV_64F, 5, 1.0, 0.0, BORDER_DEFAULT)?;
    let mut texture = Mat::default();
    core::convert_scale_abs_def(&tex, &mut texture)?;

    let mut partial = Mat::default();
    core::add_weighted_def(&gradient, 0.4, &laplacian, 0.3, 0.0, &mut partial)?;
    let mut combined = Mat::default();
    core::add_weighted_def(&partial, 0.7, &texture, 0.3, 0.0, &mut combined)?;

    let mut mean_t = Mat::default();
    imgproc::adaptive_threshold(
        &combined,
        &mut mean_t,
        255.0,
        imgproc::ADAPTIVE_THRESH_MEAN_C,
        imgproc::THRESH_BINARY,
        11,
        2.0,
    )?;
    let mut gauss_t = Mat::default();
    imgproc::adaptive_threshold(
        &combined,
        &mut gauss_t,
        255.0,
        imgproc::ADAPTIVE_THRESH_GAUSSIAN_C,
        imgproc::THRESH_BINARY,
        11,
        2.0,
    )?;
    let mut otsu_t = Mat::default();
    imgproc::threshold(
        &combined,
        &mut otsu_t,
        0.0,
        255.0,
        imgproc::THRESH_BINARY | imgproc::THRESH_OTSU,
    )?;

    let mut either = Mat::default();
    core::bitwise_or_def(&mean_t, &gauss_t, &mut either)?;
    let mut binary = Mat::default();
    core::bitwise_or_def(&either, &otsu_t, &mut binary)?;

    contour_boxes(&binary, 10.0, |b| {
        let ratio = b.aspect_ratio();
        b.width > 2 && b.height > 2 && ratio > 0.01 && ratio < 100.0
    })
}

fn stylized(gray: &Mat) -> MediaResult<Vec<PixelBox>> {
    let kernel = imgproc::get_structuring_element_def(imgproc::MORPH_RECT, Size::new(3, 3))?;

    let mut opening = Mat::default();
    imgproc::morphology_ex_def(gray, &mut opening, imgproc::MORPH_OPEN, &kernel)?;
    let mut closing = Mat::default();
    imgproc::morphology_ex_def(gray, &mut closing, imgproc::MORPH_CLOSE, &kernel)?;
    let mut gradient = Mat::default();
    imgproc::morphology_ex_def(gray, &mut gradient, imgproc::MORPH_GRADIENT, &kernel)?;

    let mut partial = Mat::default();
    core::add_weighted_def(&opening, 0.3, &closing, 0.3, 0.0, &mut partial)?;
    let mut combined = Mat::default();
    core::add_weighted_def(&partial, 0.7, &gradient, 0.3, 0.0, &mut combined)?;

    let edges = canny_union(&combined, &[(10.0, 30.0), (20.0, 60.0), (40.0, 120.0)])?;
    contour_boxes(&edges, 5.0, |b| b.width > 1 && b.height > 1)
}

fn rotated(gray: &Mat, width: u32, height: u32) -> MediaResult<Vec<(PixelBox, TextMethod)>> {
    let size = Size::new(width as i32, height as i32);
    let center = Point2f::new((width / 2) as f32, (height / 2) as f32);
    let mut out = Vec::new();

    for angle in (0..360).step_by(ROTATION_STEP as usize) {
        let angle = angle as u16;
        let view = if angle == 0 {
            gray.try_clone()?
        } else {
            let matrix = imgproc::get_rotation_matrix_2d(center, angle as f64, 1.0)?;
            let mut rotated = Mat::default();
            imgproc::warp_affine(
                gray,
                &mut rotated,
                &matrix,
                size,
                imgproc::INTER_LINEAR,
                BORDER_CONSTANT,
                Scalar::default(),
            )?;
            rotated
        };

        let edges = canny(&view, 10.0, 50.0)?;
        for bbox in contour_boxes(&edges, 3.0, |b| b.width > 1 && b.height > 1)? {
            if let Some(mapped) = unrotate_box(&bbox, angle as f64, width, height) {
                out.push((mapped, TextMethod::Rotated { angle }));
            }
        }
    }
    Ok(out)
}
