//! Video pipeline driver.
//!
//! One `Pipeline::run` is one run: open input and output, stream every frame
//! through detect → geotag → annotate → write, close, publish. The driver is an
//! explicit state machine:
//!
//! ```text
//! Idle → Opened → Streaming ⇄ (Detecting → Geotagging → Annotating → Writing)
//!                     ↓
//!                  Closed → Done
//! Opened / Streaming / any per-frame state → Failed
//! ```
//!
//! Frames are processed strictly one at a time in source order. The source and
//! sink are owned by the run and dropped on every exit path; on failure the sink
//! is dropped without being finalized, leaving partial output in place.

use std::time::Instant;

use anyhow::Result;

use crate::aggregate::{DetectionLog, GeotaggedDetection, LatestRun};
use crate::annotate::annotate_frame;
use crate::detect::{Detection, Detector};
use crate::frame::Frame;
use crate::gps::GpsExtractor;
use crate::media::{MediaBackend, OutputFormat, DEFAULT_FPS};
use crate::notify::{Alert, Notifier};
use crate::{FailureKind, PipelineError};

/// Driver states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Opened,
    Streaming,
    Detecting,
    Geotagging,
    Annotating,
    Writing,
    Closed,
    Done,
    Failed,
}

impl RunState {
    /// Legal transitions of the driver state machine.
    pub fn can_enter(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Opened)
                | (Opened, Streaming)
                | (Streaming, Detecting)
                | (Streaming, Closed)
                | (Detecting, Geotagging)
                | (Geotagging, Annotating)
                | (Annotating, Writing)
                | (Writing, Streaming)
                | (Closed, Done)
                // a new run starts from a finished one
                | (Done, Idle)
                | (Failed, Idle)
                | (Idle, Failed)
                | (Opened, Failed)
                | (Streaming, Failed)
                | (Detecting, Failed)
                | (Geotagging, Failed)
                | (Annotating, Failed)
                | (Writing, Failed)
                | (Closed, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

/// Edge-triggered "first pothole" latch. Fires once per run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AlertLatch {
    Armed,
    Fired { frame: u64 },
}

/// Per-frame progress, for CLI display.
#[derive(Clone, Copy, Debug)]
pub struct FrameProgress {
    pub index: u64,
    pub detections: usize,
    pub geotagged: bool,
    pub expected_frames: Option<u64>,
}

/// Summary of a completed run.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub input: String,
    pub output: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frames_read: u64,
    pub frames_written: u64,
    /// All detections, geotagged or not.
    pub detections_found: u64,
    /// Frame on which `pothole_detected` fired, if any.
    pub first_detection_frame: Option<u64>,
    /// The run's geotagged log, in frame order.
    pub geotagged: Vec<GeotaggedDetection>,
    /// Version of the `LatestRun` snapshot this run published.
    pub snapshot_version: u64,
    pub elapsed_ms: u128,
}

/// Pipeline driver. Reusable across runs; one run at a time.
pub struct Pipeline {
    detector: Detector,
    gps: GpsExtractor,
    notifier: Box<dyn Notifier>,
    latest: LatestRun,
    log: DetectionLog,
    state: RunState,
    default_fps: f64,
}

impl Pipeline {
    pub fn new<N: Notifier + 'static>(detector: Detector, gps: GpsExtractor, notifier: N) -> Self {
        Self {
            detector,
            gps,
            notifier: Box::new(notifier),
            latest: LatestRun::new(),
            log: DetectionLog::new(),
            state: RunState::Idle,
            default_fps: DEFAULT_FPS,
        }
    }

    /// Publish completed runs into a shared slot (e.g. one read by a map view).
    pub fn with_latest_run(mut self, latest: LatestRun) -> Self {
        self.latest = latest;
        self
    }

    /// Frame rate for outputs whose input reports none.
    pub fn with_default_fps(mut self, fps: f64) -> Self {
        self.default_fps = fps;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn latest_run(&self) -> &LatestRun {
        &self.latest
    }

    /// Best-effort view of the current run's log. Mid-run this is partial.
    pub fn detection_log(&self) -> &DetectionLog {
        &self.log
    }

    pub fn run(&mut self, media: &dyn MediaBackend, input: &str, output: &str) -> Result<RunReport> {
        self.run_with_progress(media, input, output, &mut |_| {})
    }

    /// Run the pipeline over `input`, writing the annotated video to `output`.
    ///
    /// Fatal errors carry a `PipelineError` with the failure kind.
    pub fn run_with_progress(
        &mut self,
        media: &dyn MediaBackend,
        input: &str,
        output: &str,
        on_frame: &mut dyn FnMut(&FrameProgress),
    ) -> Result<RunReport> {
        if self.state.is_terminal() {
            self.enter(RunState::Idle);
        }
        if self.state != RunState::Idle {
            return Err(PipelineError::new(
                FailureKind::Internal,
                format!("pipeline is busy ({:?})", self.state),
            )
            .into());
        }
        self.log.reset();

        match self.execute(media, input, output, on_frame) {
            Ok(report) => Ok(report),
            Err(err) => {
                self.enter(RunState::Failed);
                log::error!("run over {} failed: {:#}", input, err);
                Err(err)
            }
        }
    }

    fn execute(
        &mut self,
        media: &dyn MediaBackend,
        input: &str,
        output: &str,
        on_frame: &mut dyn FnMut(&FrameProgress),
    ) -> Result<RunReport> {
        let started = Instant::now();

        // Idle → Opened
        let mut source = media.open_input(input).map_err(|e| {
            PipelineError::new(
                FailureKind::SourceOpen,
                format!("cannot open input {}: {:#}", input, e),
            )
        })?;
        let info = source.info().clone();
        let format = OutputFormat::for_input(&info, self.default_fps);
        let mut sink = media.open_output(output, &format).map_err(|e| {
            PipelineError::new(
                FailureKind::SinkOpen,
                format!("cannot open output {}: {:#}", output, e),
            )
        })?;
        self.enter(RunState::Opened);
        log::info!(
            "processing {} -> {} ({}x{} @ {:.2} fps, detector={}, ocr={})",
            input,
            output,
            format.width,
            format.height,
            format.fps,
            self.detector.backend_name(),
            self.gps.recognizer_name()
        );

        // Opened → Streaming
        self.enter(RunState::Streaming);
        let mut latch = AlertLatch::Armed;
        let mut frames_read = 0u64;
        let mut frames_written = 0u64;
        let mut detections_found = 0u64;

        loop {
            let next = source.next_frame().map_err(|e| {
                PipelineError::new(
                    FailureKind::SourceRead,
                    format!("failed reading frame {} of {}: {:#}", frames_read, input, e),
                )
            })?;
            let Some(mut frame) = next else {
                break;
            };
            frames_read += 1;

            let (detections, geotagged) = self.process_frame(&mut frame, &mut latch)?;
            detections_found += detections as u64;

            // Writing
            sink.write(&frame).map_err(|e| {
                PipelineError::new(
                    FailureKind::SinkWrite,
                    format!("failed writing frame {} to {}: {:#}", frame.index, output, e),
                )
            })?;
            frames_written += 1;
            self.enter(RunState::Streaming);

            on_frame(&FrameProgress {
                index: frame.index,
                detections,
                geotagged,
                expected_frames: info.frame_count,
            });
        }

        // Streaming → Closed
        self.enter(RunState::Closed);
        sink.finish().map_err(|e| {
            PipelineError::new(
                FailureKind::SinkWrite,
                format!("failed finalizing {}: {:#}", output, e),
            )
        })?;
        drop(sink);
        drop(source);

        // Closed → Done
        let geotagged = self.log.snapshot();
        let snapshot_version = self
            .latest
            .publish(input, frames_read, geotagged.clone())
            .map_err(|e| PipelineError::new(FailureKind::Internal, format!("{:#}", e)))?;
        self.emit(&Alert::processing_complete());
        self.enter(RunState::Done);

        log::info!(
            "finished writing {}: {} frames, {} detections, {} geotagged",
            output,
            frames_written,
            detections_found,
            geotagged.len()
        );

        Ok(RunReport {
            input: input.to_string(),
            output: output.to_string(),
            width: format.width,
            height: format.height,
            fps: format.fps,
            frames_read,
            frames_written,
            detections_found,
            first_detection_frame: match latch {
                AlertLatch::Armed => None,
                AlertLatch::Fired { frame } => Some(frame),
            },
            geotagged,
            snapshot_version,
            elapsed_ms: started.elapsed().as_millis(),
        })
    }

    /// Detecting → Geotagging → Annotating, leaving the driver in `Writing`.
    fn process_frame(&mut self, frame: &mut Frame, latch: &mut AlertLatch) -> Result<(usize, bool)> {
        self.enter(RunState::Detecting);
        let detections: Vec<Detection> = self.detector.detect(frame).map_err(|e| {
            PipelineError::new(
                FailureKind::Internal,
                format!("detection failed on frame {}: {:#}", frame.index, e),
            )
        })?;
        if !detections.is_empty() && *latch == AlertLatch::Armed {
            *latch = AlertLatch::Fired { frame: frame.index };
            log::info!("first pothole at frame {}", frame.index);
            self.emit(&Alert::pothole_detected());
        }

        // The overlay is read on every frame, detections or not.
        self.enter(RunState::Geotagging);
        let coordinate = self.gps.extract_from_frame(frame);
        if !detections.is_empty() {
            self.log.record(&detections, coordinate);
        }

        self.enter(RunState::Annotating);
        annotate_frame(frame, &detections);

        self.enter(RunState::Writing);
        Ok((detections.len(), coordinate.is_some()))
    }

    fn emit(&mut self, alert: &Alert) {
        if let Err(e) = self.notifier.notify(alert) {
            log::warn!("alert '{}' not delivered: {:#}", alert.title, e);
        }
    }

    fn enter(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_enter(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        log::trace!("pipeline {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
