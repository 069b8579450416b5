use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::yolo::YoloParams;
use crate::gps::{DEFAULT_BASE_THRESHOLD, DEFAULT_REGION_FRACTION, DEFAULT_TESSERACT_COMMAND};
use crate::media::DEFAULT_FPS;

const DEFAULT_INPUT_SIZE: u32 = 640;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ScanConfigFile {
    detector: Option<DetectorConfigFile>,
    ocr: Option<OcrConfigFile>,
    output: Option<OutputConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    model_path: Option<PathBuf>,
    input_size: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    max_detections: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OcrConfigFile {
    command: Option<String>,
    region_fraction: Option<f64>,
    base_threshold: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OutputConfigFile {
    default_fps: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub detector: DetectorSettings,
    pub ocr: OcrSettings,
    /// Output frame rate when the input reports none.
    pub default_fps: f64,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// ONNX model. Without one the scan runs the stub detector.
    pub model_path: Option<PathBuf>,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl DetectorSettings {
    pub fn yolo_params(&self) -> YoloParams {
        YoloParams {
            confidence_threshold: self.confidence_threshold,
            iou_threshold: self.iou_threshold,
            max_detections: self.max_detections,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub command: String,
    pub region_fraction: f64,
    pub base_threshold: u8,
}

impl Default for ScanConfig {
    fn default() -> Self {
        // from_file on an empty file layer cannot fail
        Self::from_file(ScanConfigFile::default())
    }
}

impl ScanConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("POTHOLE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ScanConfigFile) -> Self {
        let defaults = YoloParams::default();
        let detector = file.detector.unwrap_or_default();
        let ocr = file.ocr.unwrap_or_default();
        let output = file.output.unwrap_or_default();
        Self {
            detector: DetectorSettings {
                model_path: detector.model_path,
                input_size: detector.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
                confidence_threshold: detector
                    .confidence_threshold
                    .unwrap_or(defaults.confidence_threshold),
                iou_threshold: detector.iou_threshold.unwrap_or(defaults.iou_threshold),
                max_detections: detector.max_detections.unwrap_or(defaults.max_detections),
            },
            ocr: OcrSettings {
                command: ocr
                    .command
                    .unwrap_or_else(|| DEFAULT_TESSERACT_COMMAND.to_string()),
                region_fraction: ocr.region_fraction.unwrap_or(DEFAULT_REGION_FRACTION),
                base_threshold: ocr.base_threshold.unwrap_or(DEFAULT_BASE_THRESHOLD),
            },
            default_fps: output.default_fps.unwrap_or(DEFAULT_FPS),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("POTHOLE_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(command) = std::env::var("POTHOLE_OCR_COMMAND") {
            if !command.trim().is_empty() {
                self.ocr.command = command;
            }
        }
        if let Ok(threshold) = std::env::var("POTHOLE_CONFIDENCE_THRESHOLD") {
            self.detector.confidence_threshold = threshold.trim().parse().map_err(|_| {
                anyhow!("POTHOLE_CONFIDENCE_THRESHOLD must be a number between 0 and 1")
            })?;
        }
        if let Ok(fps) = std::env::var("POTHOLE_DEFAULT_FPS") {
            self.default_fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("POTHOLE_DEFAULT_FPS must be a number of frames per second"))?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        let d = &self.detector;
        if !(0.0..=1.0).contains(&d.confidence_threshold) {
            return Err(anyhow!(
                "detector.confidence_threshold must be within [0, 1], got {}",
                d.confidence_threshold
            ));
        }
        if !(0.0..=1.0).contains(&d.iou_threshold) {
            return Err(anyhow!(
                "detector.iou_threshold must be within [0, 1], got {}",
                d.iou_threshold
            ));
        }
        if d.input_size == 0 || d.max_detections == 0 {
            return Err(anyhow!("detector.input_size and max_detections must be greater than zero"));
        }
        if !(self.ocr.region_fraction > 0.0 && self.ocr.region_fraction <= 1.0) {
            return Err(anyhow!(
                "ocr.region_fraction must be within (0, 1], got {}",
                self.ocr.region_fraction
            ));
        }
        if self.ocr.command.trim().is_empty() {
            return Err(anyhow!("ocr.command must not be empty"));
        }
        if !(self.default_fps.is_finite() && self.default_fps > 0.0) {
            return Err(anyhow!(
                "output.default_fps must be greater than zero, got {}",
                self.default_fps
            ));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ScanConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
