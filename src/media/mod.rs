//! Frame sources and sinks.
//!
//! This module provides the video I/O the pipeline driver runs against:
//! - Local video files via FFmpeg (feature: video-ffmpeg), decode + H.264 encode
//! - Synthetic `stub://` inputs and outputs (smoke runs without codecs)
//! - In-memory media (tests)
//!
//! The driver owns the opened source and sink for the whole run and drops them
//! on every exit path. Sources hand out frames strictly in stream order.

#[cfg(feature = "video-ffmpeg")]
pub(crate) mod ffmpeg;
mod file;
pub mod memory;
mod synthetic;

use anyhow::Result;

use crate::frame::Frame;

pub use file::FileMedia;
pub use memory::MemoryMedia;
pub use synthetic::{SyntheticSink, SyntheticSource};

/// Output codec profile: H.264 in an MP4-family container.
pub const OUTPUT_FOURCC: [u8; 4] = *b"avc1";

/// Frame rate used when the input does not report one.
pub const DEFAULT_FPS: f64 = 24.0;

/// Properties of an opened input stream.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    /// `None` when the container does not report a usable rate.
    pub fps: Option<f64>,
    /// Best-effort frame count, for progress display only.
    pub frame_count: Option<u64>,
}

/// Parameters the output sink is opened with.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputFormat {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub fourcc: [u8; 4],
}

impl OutputFormat {
    /// Same dimensions as the input; input fps, or `fallback_fps` if absent.
    pub fn for_input(info: &StreamInfo, fallback_fps: f64) -> Self {
        let fps = info
            .fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .unwrap_or(fallback_fps);
        Self {
            width: info.width,
            height: info.height,
            fps,
            fourcc: OUTPUT_FOURCC,
        }
    }

    pub fn fourcc_str(&self) -> String {
        String::from_utf8_lossy(&self.fourcc).into_owned()
    }
}

/// Sequential frame reader.
pub trait FrameSource {
    fn info(&self) -> &StreamInfo;

    /// Next frame in stream order; `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Sequential frame writer.
pub trait FrameSink {
    fn write(&mut self, frame: &Frame) -> Result<()>;

    /// Flush buffered frames and finalize the container.
    fn finish(&mut self) -> Result<()>;
}

/// Opens sources and sinks by location.
pub trait MediaBackend {
    fn open_input(&self, location: &str) -> Result<Box<dyn FrameSource>>;

    fn open_output(&self, location: &str, format: &OutputFormat) -> Result<Box<dyn FrameSink>>;
}
