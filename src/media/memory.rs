//! In-memory media for tests.
//!
//! `MemoryMedia` serves a fixed list of images as the input and records every
//! written frame in a shared buffer, so a test can inspect the output after the
//! pipeline has dropped its sink. Failure switches simulate open, read and write
//! errors.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use image::RgbImage;

use super::{FrameSink, FrameSource, MediaBackend, OutputFormat, StreamInfo};
use crate::frame::Frame;

#[derive(Clone, Default)]
pub struct MemoryMedia {
    frames: Vec<RgbImage>,
    fps: Option<f64>,
    fail_open_input: bool,
    fail_open_output: bool,
    fail_read_at: Option<u64>,
    fail_write_at: Option<u64>,
    written: Arc<Mutex<Vec<Frame>>>,
    format: Arc<Mutex<Option<OutputFormat>>>,
    finished: Arc<Mutex<bool>>,
}

impl MemoryMedia {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            frames,
            ..Self::default()
        }
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }

    pub fn failing_input(mut self) -> Self {
        self.fail_open_input = true;
        self
    }

    pub fn failing_output(mut self) -> Self {
        self.fail_open_output = true;
        self
    }

    /// Reading frame `index` returns an error.
    pub fn failing_read_at(mut self, index: u64) -> Self {
        self.fail_read_at = Some(index);
        self
    }

    /// Writing frame `index` returns an error.
    pub fn failing_write_at(mut self, index: u64) -> Self {
        self.fail_write_at = Some(index);
        self
    }

    /// Frames written so far, in write order.
    pub fn written(&self) -> Vec<(u64, RgbImage)> {
        self.written
            .lock()
            .map(|w| w.iter().map(|f| (f.index, f.image.clone())).collect())
            .unwrap_or_default()
    }

    /// Format the most recent sink was opened with.
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.format.lock().ok().and_then(|f| f.clone())
    }

    /// Whether the most recent sink was finalized.
    pub fn finished(&self) -> bool {
        self.finished.lock().map(|f| *f).unwrap_or(false)
    }
}

impl MediaBackend for MemoryMedia {
    fn open_input(&self, location: &str) -> Result<Box<dyn FrameSource>> {
        if self.fail_open_input {
            return Err(anyhow!("memory input '{}' unavailable", location));
        }
        let (width, height) = self.frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        Ok(Box::new(MemorySource {
            info: StreamInfo {
                width,
                height,
                fps: self.fps,
                frame_count: Some(self.frames.len() as u64),
            },
            frames: self.frames.clone().into_iter(),
            next_index: 0,
            fail_read_at: self.fail_read_at,
        }))
    }

    fn open_output(&self, location: &str, format: &OutputFormat) -> Result<Box<dyn FrameSink>> {
        if self.fail_open_output {
            return Err(anyhow!("memory output '{}' unavailable", location));
        }
        self.written
            .lock()
            .map_err(|_| anyhow!("memory sink lock poisoned"))?
            .clear();
        *self
            .format
            .lock()
            .map_err(|_| anyhow!("memory sink lock poisoned"))? = Some(format.clone());
        *self
            .finished
            .lock()
            .map_err(|_| anyhow!("memory sink lock poisoned"))? = false;
        Ok(Box::new(MemorySink {
            written: Arc::clone(&self.written),
            finished: Arc::clone(&self.finished),
            fail_write_at: self.fail_write_at,
            count: 0,
        }))
    }
}

struct MemorySource {
    info: StreamInfo,
    frames: std::vec::IntoIter<RgbImage>,
    next_index: u64,
    fail_read_at: Option<u64>,
}

impl FrameSource for MemorySource {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.fail_read_at == Some(self.next_index) {
            return Err(anyhow!("memory input corrupt at frame {}", self.next_index));
        }
        let Some(image) = self.frames.next() else {
            return Ok(None);
        };
        let frame = Frame::new(self.next_index, image);
        self.next_index += 1;
        Ok(Some(frame))
    }
}

struct MemorySink {
    written: Arc<Mutex<Vec<Frame>>>,
    finished: Arc<Mutex<bool>>,
    fail_write_at: Option<u64>,
    count: u64,
}

impl FrameSink for MemorySink {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        if self.fail_write_at == Some(self.count) {
            return Err(anyhow!("memory output full at frame {}", self.count));
        }
        self.written
            .lock()
            .map_err(|_| anyhow!("memory sink lock poisoned"))?
            .push(Frame::new(frame.index, frame.image.clone()));
        self.count += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        *self
            .finished
            .lock()
            .map_err(|_| anyhow!("memory sink lock poisoned"))? = true;
        Ok(())
    }
}
