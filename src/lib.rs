//! Pothole geotagger
//!
//! This crate turns a dashcam video into an annotated copy plus an ordered list of
//! geotagged pothole detections for a map view.
//!
//! # Architecture
//!
//! Every frame flows through the same fixed sequence:
//!
//! 1. **Detect**: a `DetectorBackend` proposes boxes, `Detector` normalizes them.
//! 2. **Geotag**: the bottom strip of the frame is binarized and OCR'd for a
//!    burned-in `Lat <n> ... Long <n>` overlay.
//! 3. **Aggregate**: detections with a coordinate land in the run's `DetectionLog`.
//! 4. **Annotate**: boxes and confidence labels are drawn onto the frame.
//! 5. **Write**: the frame goes to the output sink in input order.
//!
//! # Module Structure
//!
//! - `frame`: the decoded frame type
//! - `detect`: detector backends and output normalization
//! - `gps`: text-region locator, OCR preprocessing, recognizers, overlay parsing
//! - `annotate`: box + label overlay drawing
//! - `aggregate`: run-scoped detection log and the published latest-run snapshot
//! - `media`: frame sources and sinks (FFmpeg, synthetic, in-memory)
//! - `notify`: one-shot run alerts
//! - `pipeline`: the per-run driver state machine

pub mod aggregate;
pub mod annotate;
pub mod config;
pub mod detect;
pub mod frame;
pub mod gps;
pub mod media;
pub mod notify;
pub mod pipeline;
pub mod ui;

pub use aggregate::{DetectionLog, GeotaggedDetection, LatestRun, RunSnapshot};
pub use annotate::annotate_frame;
pub use detect::{BoundingBox, Detection, Detector, DetectorBackend, RawDetection, StubBackend};
pub use frame::Frame;
pub use gps::{GeoCoordinate, GpsExtractor, ScriptedRecognizer, TesseractCli, TextRecognizer};
pub use media::{FileMedia, FrameSink, FrameSource, MediaBackend, OutputFormat, StreamInfo};
pub use notify::{Alert, AlertKind, LogNotifier, Notifier};
pub use pipeline::{FrameProgress, Pipeline, RunReport, RunState};

// -------------------- Failure Surface --------------------

/// Coarse classification of a failed run, for the invoking collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// Input video could not be opened.
    SourceOpen,
    /// Output video could not be opened.
    SinkOpen,
    /// Decoding a frame from the input failed mid-run.
    SourceRead,
    /// Writing an annotated frame (or finalizing the output) failed.
    SinkWrite,
    /// Anything else: detector failures, poisoned locks, invalid state.
    Internal,
}

impl FailureKind {
    pub fn code(self) -> &'static str {
        match self {
            FailureKind::SourceOpen => "SOURCE_OPEN",
            FailureKind::SinkOpen => "SINK_OPEN",
            FailureKind::SourceRead => "SOURCE_READ",
            FailureKind::SinkWrite => "SINK_WRITE",
            FailureKind::Internal => "INTERNAL",
        }
    }
}

/// A fatal pipeline error. Travels inside `anyhow::Error`; callers recover the
/// kind with `err.downcast_ref::<PipelineError>()`.
#[derive(Clone, Debug)]
pub struct PipelineError {
    pub kind: FailureKind,
    pub message: String,
}

impl PipelineError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Extract the failure kind from an `anyhow::Error`, if it carries one.
    pub fn kind_of(err: &anyhow::Error) -> Option<FailureKind> {
        err.downcast_ref::<PipelineError>().map(|e| e.kind)
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}
impl std::error::Error for PipelineError {}
