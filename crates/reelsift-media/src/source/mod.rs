//! Sequential frame access.
//!
//! Scanning only ever moves forward: a [`FrameSource`] hands out frames in
//! increasing index order, either decoded ([`FrameSource::read_frame`]) or
//! skipped without conversion ([`FrameSource::skip_frame`]). Random access is
//! done by opening a fresh source at a start frame.

mod ffmpeg;
#[cfg(feature = "opencv")]
mod capture;

pub use self::ffmpeg::{FfmpegOpener, FfmpegSource};
#[cfg(feature = "opencv")]
pub use self::capture::{OpenCvOpener, OpenCvSource};

use reelsift_models::VideoProps;
use std::path::Path;
use std::sync::Arc;

use crate::error::MediaResult;
use crate::frame::Frame;

/// A forward-only stream of frames from one video.
pub trait FrameSource: Send {
    /// Stream properties.
    fn props(&self) -> VideoProps;

    /// Index of the frame the next read or skip will return.
    fn position(&self) -> u64;

    /// Decode the next frame; `Ok(None)` at end of stream.
    fn read_frame(&mut self) -> MediaResult<Option<Frame>>;

    /// Advance past the next frame without converting it; `Ok(false)` at end of stream.
    fn skip_frame(&mut self) -> MediaResult<bool>;
}

/// Opens videos for probing and frame access.
pub trait VideoOpener: Send + Sync {
    /// Read fps, frame count and dimensions.
    fn probe(&self, path: &Path) -> MediaResult<VideoProps>;

    /// Open a source positioned at `start_frame`.
    fn open(&self, path: &Path, start_frame: u64) -> MediaResult<Box<dyn FrameSource>>;
}

/// Pick the frame decoding backend available in this build.
pub fn default_opener() -> MediaResult<Arc<dyn VideoOpener>> {
    #[cfg(feature = "opencv")]
    {
        Ok(Arc::new(OpenCvOpener::new()))
    }
    #[cfg(not(feature = "opencv"))]
    {
        Ok(Arc::new(FfmpegOpener::new()?))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory sources for unit tests.

    use super::*;
    use crate::error::MediaError;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Frame painter: frames whose index is in `marked` are white, others black.
    #[derive(Clone)]
    pub struct ScriptedOpener {
        pub props: VideoProps,
        pub marked: Vec<u64>,
        pub fail_open_after: Option<usize>,
        pub fail_probe: bool,
        pub opens: Arc<AtomicUsize>,
        pub reads: Arc<Mutex<Vec<u64>>>,
    }

    impl ScriptedOpener {
        pub fn new(fps: f64, frame_count: u64, marked: Vec<u64>) -> Self {
            Self {
                props: VideoProps {
                    fps,
                    frame_count,
                    width: 64,
                    height: 64,
                },
                marked,
                fail_open_after: None,
                fail_probe: false,
                opens: Arc::new(AtomicUsize::new(0)),
                reads: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn read_indices(&self) -> Vec<u64> {
            self.reads.lock().unwrap().clone()
        }
    }

    impl VideoOpener for ScriptedOpener {
        fn probe(&self, path: &Path) -> MediaResult<VideoProps> {
            if self.fail_probe {
                return Err(MediaError::ffprobe_failed(
                    format!("scripted probe failure: {}", path.display()),
                    None,
                ));
            }
            Ok(self.props)
        }

        fn open(&self, _path: &Path, start_frame: u64) -> MediaResult<Box<dyn FrameSource>> {
            let n = self.opens.fetch_add(1, Ordering::SeqCst);
            if let Some(limit) = self.fail_open_after {
                if n >= limit {
                    return Err(MediaError::decode("scripted open failure"));
                }
            }
            Ok(Box::new(ScriptedSource {
                opener: self.clone(),
                next: start_frame,
            }))
        }
    }

    pub struct ScriptedSource {
        opener: ScriptedOpener,
        next: u64,
    }

    impl FrameSource for ScriptedSource {
        fn props(&self) -> VideoProps {
            self.opener.props
        }

        fn position(&self) -> u64 {
            self.next
        }

        fn read_frame(&mut self) -> MediaResult<Option<Frame>> {
            if self.next >= self.opener.props.frame_count {
                return Ok(None);
            }
            let index = self.next;
            self.next += 1;
            self.opener.reads.lock().unwrap().push(index);

            let value = if self.opener.marked.contains(&index) { 255 } else { 0 };
            let image = RgbImage::from_pixel(
                self.opener.props.width,
                self.opener.props.height,
                Rgb([value, value, value]),
            );
            Ok(Some(Frame::new(
                index,
                crate::frame::timestamp_for(index, self.opener.props.fps),
                image,
            )))
        }

        fn skip_frame(&mut self) -> MediaResult<bool> {
            if self.next >= self.opener.props.frame_count {
                return Ok(false);
            }
            self.next += 1;
            Ok(true)
        }
    }

    /// Returns true for frames painted white by [`ScriptedOpener`].
    pub fn is_marked(frame: &Frame) -> bool {
        frame.image.get_pixel(0, 0)[0] == 255
    }
}
