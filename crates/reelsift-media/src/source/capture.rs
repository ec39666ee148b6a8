//! Frame source backed by OpenCV `VideoCapture`.

use opencv::core::Mat;
use opencv::imgproc;
use opencv::prelude::{MatTraitConst, MatTraitConstManual, VideoCaptureTrait, VideoCaptureTraitConst};
use opencv::videoio::{
    VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_FRAME_HEIGHT,
    CAP_PROP_FRAME_WIDTH, CAP_PROP_POS_FRAMES,
};
use reelsift_models::VideoProps;
use std::path::Path;
use tracing::debug;

use super::{FrameSource, VideoOpener};
use crate::error::{MediaError, MediaResult};
use crate::frame::{timestamp_for, Frame};

/// Opens videos with OpenCV's default capture backend.
#[derive(Debug, Clone, Default)]
pub struct OpenCvOpener;

impl OpenCvOpener {
    pub fn new() -> Self {
        Self
    }
}

fn open_capture(path: &Path) -> MediaResult<VideoCapture> {
    let path_str = path
        .to_str()
        .ok_or_else(|| MediaError::InvalidVideo(format!("Non UTF-8 path: {}", path.display())))?;

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let cap = VideoCapture::from_file(path_str, CAP_ANY)
        .map_err(|e| MediaError::InvalidVideo(format!("Failed to open video: {}", e)))?;

    if !cap.is_opened().unwrap_or(false) {
        return Err(MediaError::InvalidVideo(format!(
            "Failed to open video file: {}",
            path_str
        )));
    }
    Ok(cap)
}

fn read_props(cap: &VideoCapture) -> MediaResult<VideoProps> {
    let fps = cap.get(CAP_PROP_FPS).unwrap_or(0.0);
    let frame_count = cap.get(CAP_PROP_FRAME_COUNT).unwrap_or(0.0);
    let width = cap.get(CAP_PROP_FRAME_WIDTH).unwrap_or(0.0);
    let height = cap.get(CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0);

    if !(fps > 0.0) || !(frame_count > 0.0) || !(width > 0.0) || !(height > 0.0) {
        return Err(MediaError::InvalidVideo(format!(
            "Unreadable stream properties: fps={} frames={} {}x{}",
            fps, frame_count, width, height
        )));
    }

    Ok(VideoProps {
        fps,
        frame_count: frame_count as u64,
        width: width as u32,
        height: height as u32,
    })
}

impl VideoOpener for OpenCvOpener {
    fn probe(&self, path: &Path) -> MediaResult<VideoProps> {
        let cap = open_capture(path)?;
        read_props(&cap)
    }

    fn open(&self, path: &Path, start_frame: u64) -> MediaResult<Box<dyn FrameSource>> {
        let mut cap = open_capture(path)?;
        let props = read_props(&cap)?;

        if start_frame > 0 {
            cap.set(CAP_PROP_POS_FRAMES, start_frame as f64)?;
        }
        debug!(path = %path.display(), start_frame, "Opened OpenCV capture");

        Ok(Box::new(OpenCvSource {
            cap,
            props,
            next: start_frame,
            bgr: Mat::default(),
        }))
    }
}

/// Sequential reader over a `VideoCapture`.
pub struct OpenCvSource {
    cap: VideoCapture,
    props: VideoProps,
    next: u64,
    bgr: Mat,
}

impl FrameSource for OpenCvSource {
    fn props(&self) -> VideoProps {
        self.props
    }

    fn position(&self) -> u64 {
        self.next
    }

    fn read_frame(&mut self) -> MediaResult<Option<Frame>> {
        if !self.cap.read(&mut self.bgr)? || self.bgr.empty() {
            return Ok(None);
        }
        let index = self.next;
        self.next += 1;

        let mut rgb = Mat::default();
        imgproc::cvt_color_def(&self.bgr, &mut rgb, imgproc::COLOR_BGR2RGB)?;

        let width = rgb.cols() as u32;
        let height = rgb.rows() as u32;
        let data = rgb.data_bytes()?.to_vec();

        let frame = Frame::from_rgb24(index, timestamp_for(index, self.props.fps), width, height, data)
            .ok_or_else(|| MediaError::decode("Frame buffer size mismatch"))?;
        Ok(Some(frame))
    }

    fn skip_frame(&mut self) -> MediaResult<bool> {
        if !self.cap.grab()? {
            return Ok(false);
        }
        self.next += 1;
        Ok(true)
    }
}
