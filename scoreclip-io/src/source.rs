//! Frame-by-frame access to a video file.
//!
//! The scan wants every frame in order but only decodes one in every N, so sources expose OpenCV's
//! grab/retrieve split: [`FrameSource::grab`] advances past a frame cheaply and [`FrameSource::retrieve`]
//! decodes the last grabbed one.
//!
//! Recordings that are still being written report a frame count that lags behind the real stream, so
//! a source can be reopened at a frame index to pick up whatever was appended since it was opened.
use std::path::{Path, PathBuf};

use opencv::{core::Mat, imgproc, prelude::*, videoio};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("could not open video {0}")]
    OpenFailed(PathBuf),
    #[error("video {path} reports a frame rate of {fps}")]
    InvalidFps { path: PathBuf, fps: f64 },
}

/// Stream properties, read once when the source is opened.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VideoInfo {
    pub fps: f64,
    pub width: i32,
    pub height: i32,
    /// Frame count at open time.
    pub frame_count: i64,
}

impl VideoInfo {
    /// Duration in seconds implied by the frame count.
    pub fn duration_secs(&self) -> f64 {
        self.frame_count as f64 / self.fps
    }

    /// Frame index closest to `secs` into the video.
    pub fn frame_at(&self, secs: f64) -> i64 {
        (secs * self.fps).round() as i64
    }
}

pub trait FrameSource {
    fn info(&self) -> VideoInfo;

    /// Frame count as currently reported by the container. May grow while the file is being written.
    fn frame_count(&self) -> anyhow::Result<i64>;

    /// Positions the source so the next [`grab`](FrameSource::grab) returns frame `frame`.
    fn seek(&mut self, frame: i64) -> anyhow::Result<()>;

    /// Closes and reopens the underlying file, then seeks to `frame`.
    fn reopen(&mut self, frame: i64) -> anyhow::Result<()>;

    /// Advances one frame without decoding it. Returns false at end of stream.
    fn grab(&mut self) -> anyhow::Result<bool>;

    /// Decodes the last grabbed frame as RGB.
    fn retrieve(&mut self) -> anyhow::Result<Mat>;

    /// Timestamp of the last grabbed frame, in seconds.
    fn position_secs(&self) -> anyhow::Result<f64>;
}

/// [`FrameSource`] over an OpenCV [`videoio::VideoCapture`].
pub struct CaptureSource {
    path: PathBuf,
    capture: videoio::VideoCapture,
    info: VideoInfo,
}

impl CaptureSource {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let capture = Self::open_capture(path)?;
        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        if fps.is_nan() || fps <= 0.0 {
            return Err(SourceError::InvalidFps { path: path.to_path_buf(), fps }.into());
        }
        let info = VideoInfo {
            fps,
            width: capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32,
            height: capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32,
            frame_count: capture.get(videoio::CAP_PROP_FRAME_COUNT)? as i64,
        };
        tracing::debug!("opened {}: {info:?}", path.display());
        Ok(Self { path: path.to_path_buf(), capture, info })
    }

    fn open_capture(path: &Path) -> anyhow::Result<videoio::VideoCapture> {
        let capture = videoio::VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(SourceError::OpenFailed(path.to_path_buf()).into());
        }
        Ok(capture)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for CaptureSource {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn frame_count(&self) -> anyhow::Result<i64> {
        Ok(self.capture.get(videoio::CAP_PROP_FRAME_COUNT)? as i64)
    }

    fn seek(&mut self, frame: i64) -> anyhow::Result<()> {
        if frame > 0 {
            self.capture.set(videoio::CAP_PROP_POS_FRAMES, frame as f64)?;
        }
        Ok(())
    }

    fn reopen(&mut self, frame: i64) -> anyhow::Result<()> {
        self.capture.release()?;
        self.capture = Self::open_capture(&self.path)?;
        self.seek(frame)
    }

    fn grab(&mut self) -> anyhow::Result<bool> {
        Ok(self.capture.grab()?)
    }

    fn retrieve(&mut self) -> anyhow::Result<Mat> {
        let mut bgr = Mat::default();
        if !self.capture.retrieve_def(&mut bgr)? || bgr.empty() {
            anyhow::bail!("failed to decode frame from {}", self.path.display());
        }
        let mut rgb = Mat::default();
        imgproc::cvt_color_def(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB)?;
        Ok(rgb)
    }

    fn position_secs(&self) -> anyhow::Result<f64> {
        Ok(self.capture.get(videoio::CAP_PROP_POS_MSEC)? / 1000.0)
    }
}
