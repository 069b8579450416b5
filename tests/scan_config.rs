use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use pothole_geotagger::config::ScanConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "POTHOLE_CONFIG",
        "POTHOLE_MODEL_PATH",
        "POTHOLE_OCR_COMMAND",
        "POTHOLE_CONFIDENCE_THRESHOLD",
        "POTHOLE_DEFAULT_FPS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "detector": {
            "model_path": "models/pothole.onnx",
            "input_size": 320,
            "confidence_threshold": 0.4,
            "iou_threshold": 0.5,
            "max_detections": 20
        },
        "ocr": {
            "command": "/opt/tesseract/bin/tesseract",
            "region_fraction": 0.25,
            "base_threshold": 128
        },
        "output": {
            "default_fps": 30.0
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("POTHOLE_CONFIG", file.path());
    std::env::set_var("POTHOLE_CONFIDENCE_THRESHOLD", "0.6");
    std::env::set_var("POTHOLE_DEFAULT_FPS", "25");

    let cfg = ScanConfig::load().expect("load config");

    assert_eq!(cfg.detector.model_path, Some(PathBuf::from("models/pothole.onnx")));
    assert_eq!(cfg.detector.input_size, 320);
    assert_eq!(cfg.detector.confidence_threshold, 0.6);
    assert_eq!(cfg.detector.iou_threshold, 0.5);
    assert_eq!(cfg.detector.max_detections, 20);
    assert_eq!(cfg.ocr.command, "/opt/tesseract/bin/tesseract");
    assert_eq!(cfg.ocr.region_fraction, 0.25);
    assert_eq!(cfg.ocr.base_threshold, 128);
    assert_eq!(cfg.default_fps, 25.0);

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
        [detector]
        confidence_threshold = 0.3

        [ocr]
        command = "tesseract-5"
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    std::env::set_var("POTHOLE_CONFIG", file.path());
    std::env::set_var("POTHOLE_MODEL_PATH", "yolo.onnx");

    let cfg = ScanConfig::load().expect("load config");

    assert_eq!(cfg.detector.confidence_threshold, 0.3);
    assert_eq!(cfg.detector.model_path, Some(PathBuf::from("yolo.onnx")));
    assert_eq!(cfg.ocr.command, "tesseract-5");
    assert_eq!(cfg.ocr.region_fraction, 0.20);
    assert_eq!(cfg.default_fps, 24.0);

    clear_env();
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ScanConfig::load().expect("load config");
    assert!(cfg.detector.model_path.is_none());
    assert_eq!(cfg.ocr.command, "tesseract");
    assert_eq!(cfg.ocr.base_threshold, 150);

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("POTHOLE_CONFIDENCE_THRESHOLD", "high");
    assert!(ScanConfig::load().is_err());
    clear_env();

    std::env::set_var("POTHOLE_DEFAULT_FPS", "0");
    assert!(ScanConfig::load().is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{"ocr": {"region_fraction": 1.5}}"#)
        .expect("write config");
    std::env::set_var("POTHOLE_CONFIG", file.path());
    assert!(ScanConfig::load().is_err());

    clear_env();
}

#[test]
fn unknown_sections_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{"rtsp": {"url": "rtsp://cam"}}"#)
        .expect("write config");
    std::env::set_var("POTHOLE_CONFIG", file.path());
    assert!(ScanConfig::load().is_err());

    clear_env();
}
