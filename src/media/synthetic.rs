//! Synthetic `stub://` media.
//!
//! A `stub://` input yields a short gradient clip (640x480, no container frame
//! rate); `stub://name?frames=N` overrides the clip length. A `stub://` output
//! discards frames and only counts them. Used for smoke runs on machines
//! without FFmpeg.

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

use super::{FrameSink, FrameSource, OutputFormat, StreamInfo};
use crate::frame::Frame;

pub const STUB_SCHEME: &str = "stub://";
const STUB_WIDTH: u32 = 640;
const STUB_HEIGHT: u32 = 480;
const STUB_DEFAULT_FRAMES: u64 = 48;

pub struct SyntheticSource {
    info: StreamInfo,
    total_frames: u64,
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticSource {
    pub fn new(location: &str) -> Result<Self> {
        let total = parse_frame_count(location)?;
        log::info!("SyntheticSource: opened {} ({} frames)", location, total);
        Ok(Self {
            info: StreamInfo {
                width: STUB_WIDTH,
                height: STUB_HEIGHT,
                fps: None,
                frame_count: Some(total),
            },
            total_frames: total,
            frame_count: 0,
            scene_state: 0,
        })
    }

    fn generate_synthetic_image(&mut self) -> RgbImage {
        if self.frame_count % 12 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let scene = self.scene_state;
        let shift = self.frame_count as u32 + scene as u32;
        RgbImage::from_fn(STUB_WIDTH, STUB_HEIGHT, |x, y| {
            Rgb([
                ((x + shift) % 256) as u8,
                ((y + shift) % 256) as u8,
                scene.wrapping_mul(40),
            ])
        })
    }
}

impl FrameSource for SyntheticSource {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.frame_count >= self.total_frames {
            return Ok(None);
        }
        let image = self.generate_synthetic_image();
        let frame = Frame::new(self.frame_count, image);
        self.frame_count += 1;
        Ok(Some(frame))
    }
}

/// Output that counts frames and throws them away.
pub struct SyntheticSink {
    format: OutputFormat,
    frames_written: u64,
}

impl SyntheticSink {
    pub fn new(location: &str, format: &OutputFormat) -> Self {
        log::info!(
            "SyntheticSink: {} {}x{} @ {:.2} fps ({})",
            location,
            format.width,
            format.height,
            format.fps,
            format.fourcc_str()
        );
        Self {
            format: format.clone(),
            frames_written: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl FrameSink for SyntheticSink {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        if frame.width() != self.format.width || frame.height() != self.format.height {
            return Err(anyhow!(
                "frame {} is {}x{}, sink expects {}x{}",
                frame.index,
                frame.width(),
                frame.height(),
                self.format.width,
                self.format.height
            ));
        }
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        log::debug!("SyntheticSink: discarded {} frames", self.frames_written);
        Ok(())
    }
}

fn parse_frame_count(location: &str) -> Result<u64> {
    let Some((_, query)) = location.split_once('?') else {
        return Ok(STUB_DEFAULT_FRAMES);
    };
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("frames=") {
            return value
                .parse()
                .map_err(|_| anyhow!("invalid frame count '{}' in {}", value, location));
        }
    }
    Ok(STUB_DEFAULT_FRAMES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_source_stops_after_requested_frames() {
        let mut source = SyntheticSource::new("stub://road?frames=3").unwrap();
        let mut indices = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!((frame.width(), frame.height()), (640, 480));
            indices.push(frame.index);
        }
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(source.info().fps, None);
    }

    #[test]
    fn default_clip_length() {
        let source = SyntheticSource::new("stub://road").unwrap();
        assert_eq!(source.info().frame_count, Some(STUB_DEFAULT_FRAMES));
    }

    #[test]
    fn bad_frame_count_is_rejected() {
        assert!(SyntheticSource::new("stub://road?frames=lots").is_err());
    }

    #[test]
    fn synthetic_sink_rejects_mismatched_frames() {
        let format = OutputFormat {
            width: 8,
            height: 8,
            fps: 24.0,
            fourcc: *b"avc1",
        };
        let mut sink = SyntheticSink::new("stub://out", &format);
        sink.write(&Frame::new(0, RgbImage::new(8, 8))).unwrap();
        assert!(sink.write(&Frame::new(1, RgbImage::new(4, 4))).is_err());
        assert_eq!(sink.frames_written(), 1);
    }
}
