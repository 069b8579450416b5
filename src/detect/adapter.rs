use anyhow::{Context, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection, RawDetection};
use crate::frame::Frame;

/// Confidence is reported with this many decimal digits.
const CONFIDENCE_DECIMALS: i32 = 2;

/// Runs a backend on one frame and normalizes its output into `Detection`s.
pub struct Detector {
    backend: Box<dyn DetectorBackend>,
}

impl Detector {
    pub fn new<B: DetectorBackend + 'static>(backend: B) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    pub fn from_boxed(backend: Box<dyn DetectorBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn warm_up(&mut self) -> Result<()> {
        self.backend.warm_up()
    }

    /// Detect potholes in `frame`. An empty result is a normal outcome.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let raw = self
            .backend
            .detect(frame)
            .with_context(|| format!("{} backend failed on frame {}", self.backend.name(), frame.index))?;
        Ok(normalize(&raw, frame.width(), frame.height()))
    }
}

/// Clamp boxes into `[0, width) x [0, height)`, order corners, clamp and round
/// confidence. Non-finite entries are dropped.
pub fn normalize(raw: &[RawDetection], width: u32, height: u32) -> Vec<Detection> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;

    raw.iter()
        .filter(|r| r.is_finite())
        .map(|r| {
            // `as u32` truncates toward zero, matching integer pixel casts.
            let x1 = r.x1.clamp(0.0, max_x) as u32;
            let y1 = r.y1.clamp(0.0, max_y) as u32;
            let x2 = r.x2.clamp(0.0, max_x) as u32;
            let y2 = r.y2.clamp(0.0, max_y) as u32;
            Detection {
                bounding_box: BoundingBox::new(x1, y1, x2, y2),
                confidence: round_confidence(r.confidence),
            }
        })
        .collect()
}

pub(crate) fn round_confidence(confidence: f32) -> f32 {
    let scale = 10f32.powi(CONFIDENCE_DECIMALS);
    (confidence.clamp(0.0, 1.0) * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::StubBackend;
    use image::RgbImage;

    fn frame(width: u32, height: u32) -> Frame {
        Frame::new(0, RgbImage::new(width, height))
    }

    #[test]
    fn rounds_confidence_to_two_decimals() {
        assert_eq!(round_confidence(0.8349), 0.83);
        assert_eq!(round_confidence(0.835_1), 0.84);
        assert_eq!(round_confidence(1.7), 1.0);
        assert_eq!(round_confidence(-0.2), 0.0);
    }

    #[test]
    fn clamps_boxes_into_frame() {
        let raw = [RawDetection::new(-12.0, 5.5, 700.0, 900.0, 0.91)];
        let out = normalize(&raw, 640, 480);
        assert_eq!(out.len(), 1);
        assert_eq!(<[u32; 4]>::from(out[0].bounding_box), [0, 5, 639, 479]);
    }

    #[test]
    fn inverted_corners_are_reordered() {
        let raw = [RawDetection::new(50.0, 60.0, 10.0, 20.0, 0.5)];
        let out = normalize(&raw, 100, 100);
        assert_eq!(<[u32; 4]>::from(out[0].bounding_box), [10, 20, 50, 60]);
    }

    #[test]
    fn drops_non_finite_output() {
        let raw = [
            RawDetection::new(f32::NAN, 0.0, 10.0, 10.0, 0.5),
            RawDetection::new(0.0, 0.0, 10.0, 10.0, f32::INFINITY),
            RawDetection::new(1.0, 1.0, 2.0, 2.0, 0.4),
        ];
        assert_eq!(normalize(&raw, 100, 100).len(), 1);
    }

    #[test]
    fn normalized_detections_stay_in_bounds() {
        let raw: Vec<RawDetection> = (0..50)
            .map(|i| {
                let v = i as f32 * 37.0 - 400.0;
                RawDetection::new(v, -v, v * 2.0, v + 13.0, v / 100.0)
            })
            .collect();
        for d in normalize(&raw, 320, 240) {
            let b = d.bounding_box;
            assert!(b.x1 <= b.x2 && b.x2 < 320);
            assert!(b.y1 <= b.y2 && b.y2 < 240);
            assert!((0.0..=1.0).contains(&d.confidence));
        }
    }

    #[test]
    fn empty_backend_output_is_not_an_error() {
        let mut detector = Detector::new(StubBackend::new());
        let out = detector.detect(&frame(32, 32)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn detector_does_not_touch_frame() {
        let f = frame(16, 16);
        let before = f.pixels().to_vec();
        let mut detector = Detector::new(StubBackend::scripted(vec![vec![RawDetection::new(
            1.0, 1.0, 8.0, 8.0, 0.7,
        )]]));
        let out = detector.detect(&f).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(f.pixels(), before.as_slice());
    }
}
