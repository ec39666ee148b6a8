//! Frame source backed by an `ffmpeg` child process emitting rgb24 rawvideo.

use reelsift_models::VideoProps;
use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use tracing::{debug, warn};

use super::{FrameSource, VideoOpener};
use crate::error::{MediaError, MediaResult};
use crate::frame::{timestamp_for, Frame};
use crate::probe::probe_video_props;

/// Opens videos through `ffprobe` + `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegOpener {
    _private: (),
}

impl FfmpegOpener {
    /// Create an opener after checking both binaries are on PATH.
    pub fn new() -> MediaResult<Self> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;
        which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;
        Ok(Self { _private: () })
    }
}

impl VideoOpener for FfmpegOpener {
    fn probe(&self, path: &Path) -> MediaResult<VideoProps> {
        probe_video_props(path)
    }

    fn open(&self, path: &Path, start_frame: u64) -> MediaResult<Box<dyn FrameSource>> {
        let props = probe_video_props(path)?;
        Ok(Box::new(FfmpegSource::spawn(path, props, start_frame)?))
    }
}

/// Streams decoded frames from an `ffmpeg` child.
///
/// The child is killed when the source is dropped, so abandoning a scan early
/// never leaves a decoder running.
pub struct FfmpegSource {
    child: Child,
    reader: BufReader<ChildStdout>,
    props: VideoProps,
    next: u64,
    frame_bytes: usize,
    scratch: Vec<u8>,
    finished: bool,
}

impl FfmpegSource {
    /// Spawn a decoder positioned at `start_frame`.
    pub fn spawn(path: &Path, props: VideoProps, start_frame: u64) -> MediaResult<Self> {
        let start_seconds = timestamp_for(start_frame, props.fps);

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin"]);
        if start_frame > 0 {
            cmd.args(["-ss", &format!("{:.3}", start_seconds)]);
        }
        cmd.arg("-i")
            .arg(path)
            .args([
                "-map", "0:v:0",
                "-vsync", "passthrough",
                "-pix_fmt", "rgb24",
                "-f", "rawvideo",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        debug!(
            path = %path.display(),
            start_frame,
            "Spawning FFmpeg frame decoder"
        );

        let mut child = cmd.spawn().map_err(|e| {
            MediaError::ffmpeg_failed(format!("Failed to spawn FFmpeg: {}", e), None, None)
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            MediaError::ffmpeg_failed("Failed to capture FFmpeg stdout", None, None)
        })?;

        let frame_bytes = props.width as usize * props.height as usize * 3;
        Ok(Self {
            child,
            reader: BufReader::with_capacity(frame_bytes.max(8192), stdout),
            props,
            next: start_frame,
            frame_bytes,
            scratch: vec![0; frame_bytes],
            finished: false,
        })
    }

    /// Fill `scratch` with the next frame; false on a clean end of stream.
    fn read_raw(&mut self) -> MediaResult<bool> {
        if self.finished {
            return Ok(false);
        }

        let mut filled = 0;
        while filled < self.frame_bytes {
            match self.reader.read(&mut self.scratch[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(MediaError::decode(format!("FFmpeg read failed: {}", e))),
            }
        }

        if filled == 0 {
            self.finished = true;
            return Ok(false);
        }
        if filled < self.frame_bytes {
            // Truncated trailing frame
            warn!(
                frame_index = self.next,
                bytes = filled,
                expected = self.frame_bytes,
                "Discarding truncated frame at end of stream"
            );
            self.finished = true;
            return Ok(false);
        }
        Ok(true)
    }
}

impl FrameSource for FfmpegSource {
    fn props(&self) -> VideoProps {
        self.props
    }

    fn position(&self) -> u64 {
        self.next
    }

    fn read_frame(&mut self) -> MediaResult<Option<Frame>> {
        if !self.read_raw()? {
            return Ok(None);
        }
        let index = self.next;
        self.next += 1;

        let frame = Frame::from_rgb24(
            index,
            timestamp_for(index, self.props.fps),
            self.props.width,
            self.props.height,
            self.scratch.clone(),
        )
        .ok_or_else(|| MediaError::decode("Frame buffer size mismatch"))?;
        Ok(Some(frame))
    }

    fn skip_frame(&mut self) -> MediaResult<bool> {
        if !self.read_raw()? {
            return Ok(false);
        }
        self.next += 1;
        Ok(true)
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}
