//! Local file media.
//!
//! `FileMedia` opens inputs and outputs by location:
//! - `stub://...` → synthetic source / discarding sink
//! - local paths → FFmpeg decode / H.264 encode (feature: video-ffmpeg)
//!
//! Only local paths are accepted; URL schemes other than `stub://` are refused.

use anyhow::{anyhow, Result};

#[cfg(feature = "video-ffmpeg")]
use super::ffmpeg::{FfmpegFileSink, FfmpegFileSource};
use super::synthetic::STUB_SCHEME;
use super::{FrameSink, FrameSource, MediaBackend, OutputFormat, SyntheticSink, SyntheticSource};

/// Media backend for local files.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileMedia;

impl FileMedia {
    pub fn new() -> Self {
        Self
    }
}

impl MediaBackend for FileMedia {
    fn open_input(&self, location: &str) -> Result<Box<dyn FrameSource>> {
        if !is_local_file_path(location) {
            return Err(anyhow!(
                "video input only supports local paths (no URL schemes): '{}'",
                location
            ));
        }
        if location.starts_with(STUB_SCHEME) {
            return Ok(Box::new(SyntheticSource::new(location)?));
        }
        #[cfg(feature = "video-ffmpeg")]
        {
            Ok(Box::new(FfmpegFileSource::new(location)?))
        }
        #[cfg(not(feature = "video-ffmpeg"))]
        {
            Err(anyhow!(
                "decoding '{}' requires the video-ffmpeg feature",
                location
            ))
        }
    }

    fn open_output(&self, location: &str, format: &OutputFormat) -> Result<Box<dyn FrameSink>> {
        if !is_local_file_path(location) {
            return Err(anyhow!(
                "video output only supports local paths (no URL schemes): '{}'",
                location
            ));
        }
        if format.width == 0 || format.height == 0 {
            return Err(anyhow!(
                "cannot open output with empty frame size {}x{}",
                format.width,
                format.height
            ));
        }
        if location.starts_with(STUB_SCHEME) {
            return Ok(Box::new(SyntheticSink::new(location, format)));
        }
        #[cfg(feature = "video-ffmpeg")]
        {
            Ok(Box::new(FfmpegFileSink::new(location, format)?))
        }
        #[cfg(not(feature = "video-ffmpeg"))]
        {
            Err(anyhow!(
                "encoding '{}' requires the video-ffmpeg feature",
                location
            ))
        }
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with(STUB_SCHEME) {
        return true;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> OutputFormat {
        OutputFormat {
            width: 640,
            height: 480,
            fps: 24.0,
            fourcc: *b"avc1",
        }
    }

    #[test]
    fn rejects_remote_locations() {
        let media = FileMedia::new();
        assert!(media.open_input("rtsp://camera/1").is_err());
        assert!(media.open_input("   ").is_err());
        assert!(media.open_output("https://example.com/out.mp4", &format()).is_err());
    }

    #[test]
    fn stub_locations_open_without_codecs() {
        let media = FileMedia::new();
        let mut source = media.open_input("stub://road?frames=2").unwrap();
        let mut sink = media.open_output("stub://out", &format()).unwrap();
        while let Some(frame) = source.next_frame().unwrap() {
            sink.write(&frame).unwrap();
        }
        sink.finish().unwrap();
    }

    #[test]
    fn empty_output_size_is_refused() {
        let media = FileMedia::new();
        let mut bad = format();
        bad.width = 0;
        assert!(media.open_output("stub://out", &bad).is_err());
    }

    #[cfg(not(feature = "video-ffmpeg"))]
    #[test]
    fn real_files_need_ffmpeg_feature() {
        let media = FileMedia::new();
        let err = media.open_input("clip.mp4").err().unwrap();
        assert!(err.to_string().contains("video-ffmpeg"));
    }
}
