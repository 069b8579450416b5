//! pothole_scan - detect potholes in a dashcam video and geotag them
//!
//! Reads a video with a burned-in GPS overlay, writes an annotated copy, and
//! optionally saves the geotagged detections as JSON for the map view.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use pothole_geotagger::config::ScanConfig;
use pothole_geotagger::ui::{Ui, UiMode};
use pothole_geotagger::{
    Detector, DetectorBackend, FileMedia, GpsExtractor, LogNotifier, Pipeline, PipelineError,
    StubBackend, TesseractCli,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input video (local path, or stub://name?frames=N for a synthetic clip).
    input: String,
    /// Annotated output video (H.264).
    output: String,
    /// Write geotagged detections to this JSON file.
    #[arg(long, value_name = "PATH")]
    detections: Option<PathBuf>,
    /// ONNX detector model; overrides the config file.
    #[arg(long, env = "POTHOLE_MODEL_PATH", value_name = "PATH")]
    model: Option<PathBuf>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::new(args.ui, is_tty, !stdout_is_tty);

    let mut cfg = ScanConfig::load()?;
    if let Some(model) = args.model.clone() {
        cfg.detector.model_path = Some(model);
    }

    let detector = {
        let _stage = ui.stage("Load detector");
        let mut detector = Detector::from_boxed(build_backend(&cfg)?);
        detector.warm_up()?;
        detector
    };
    log::info!("detector backend: {}", detector.backend_name());
    let gps = GpsExtractor::new(TesseractCli::new(cfg.ocr.command.clone()))
        .with_region_fraction(cfg.ocr.region_fraction)
        .with_base_threshold(cfg.ocr.base_threshold);

    let mut pipeline =
        Pipeline::new(detector, gps, LogNotifier).with_default_fps(cfg.default_fps);

    let report = {
        let mut bar = ui.frames();
        pipeline.run_with_progress(&FileMedia::new(), &args.input, &args.output, &mut |p| {
            bar.update(p)
        })
    };
    let report = match report {
        Ok(report) => report,
        Err(err) => {
            if let Some(kind) = PipelineError::kind_of(&err) {
                log::error!("scan aborted ({})", kind.code());
            }
            return Err(err);
        }
    };

    if let Some(path) = &args.detections {
        let _stage = ui.stage("Write detections");
        let json = pipeline.detection_log().to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write detections to {}", path.display()))?;
    }

    println!(
        "{}: {} frames, {} potholes ({} geotagged) -> {}",
        report.input,
        report.frames_written,
        report.detections_found,
        report.geotagged.len(),
        report.output
    );
    Ok(())
}

fn build_backend(cfg: &ScanConfig) -> Result<Box<dyn DetectorBackend>> {
    match &cfg.detector.model_path {
        #[cfg(feature = "backend-tract")]
        Some(path) => {
            let backend =
                pothole_geotagger::detect::TractBackend::new(path, cfg.detector.input_size)?
                    .with_params(cfg.detector.yolo_params());
            Ok(Box::new(backend))
        }
        #[cfg(not(feature = "backend-tract"))]
        Some(path) => Err(anyhow::anyhow!(
            "model {} needs the backend-tract feature",
            path.display()
        )),
        None => {
            log::warn!("no detector model configured; using the stub detector (no detections)");
            Ok(Box::new(StubBackend::new()))
        }
    }
}
