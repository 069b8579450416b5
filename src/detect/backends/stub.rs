use std::collections::VecDeque;

use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Stub backend for testing and dry runs.
///
/// Replays a script of per-frame outputs in call order; once the script is
/// exhausted every frame yields no detections.
#[derive(Default)]
pub struct StubBackend {
    script: VecDeque<Vec<RawDetection>>,
    calls: u64,
}

impl StubBackend {
    /// A backend that never detects anything.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that returns `script[i]` for the i-th call.
    pub fn scripted(script: Vec<Vec<RawDetection>>) -> Self {
        Self {
            script: script.into(),
            calls: 0,
        }
    }

    /// Number of frames this backend has been asked about.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
        self.calls += 1;
        Ok(self.script.pop_front().unwrap_or_default())
    }
}
