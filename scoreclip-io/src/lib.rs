//! Reads frames out of event recordings.
//!

pub mod source;
pub mod time;

pub use source::{CaptureSource, FrameSource, SourceError, VideoInfo};
