use serde::{Deserialize, Serialize};

/// Unnormalized detector output, in frame pixel coordinates.
///
/// Backends may return boxes that spill outside the frame, inverted corners, or
/// scores outside 0..1; `Detector` cleans these up.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl RawDetection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    pub(crate) fn is_finite(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2, self.confidence]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Pixel bounding box. Always `x1 <= x2`, `y1 <= y2`, inside the frame.
///
/// Serializes as `[x1, y1, x2, y2]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

impl From<[u32; 4]> for BoundingBox {
    fn from(v: [u32; 4]) -> Self {
        BoundingBox::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [u32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One normalized pothole candidate in one frame. Immutable once created.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub bounding_box: BoundingBox,
    /// In `[0, 1]`, rounded to two decimals.
    pub confidence: f32,
}

impl Detection {
    /// Text drawn next to the box on the annotated frame.
    pub fn label(&self) -> String {
        format!("Pothole:{:.2}", self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_orders_corners() {
        let b = BoundingBox::new(50, 60, 10, 20);
        assert_eq!(<[u32; 4]>::from(b), [10, 20, 50, 60]);
        assert_eq!(b.width(), 40);
        assert_eq!(b.height(), 40);
    }

    #[test]
    fn bounding_box_serializes_as_array() {
        let b = BoundingBox::new(10, 20, 50, 60);
        assert_eq!(serde_json::to_string(&b).unwrap(), "[10,20,50,60]");
        let back: BoundingBox = serde_json::from_str("[10,20,50,60]").unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn label_uses_two_decimals() {
        let d = Detection {
            bounding_box: BoundingBox::new(0, 0, 1, 1),
            confidence: 0.8,
        };
        assert_eq!(d.label(), "Pothole:0.80");
    }

    #[test]
    fn non_finite_raw_detection_is_flagged() {
        assert!(RawDetection::new(0.0, 0.0, 1.0, 1.0, 0.5).is_finite());
        assert!(!RawDetection::new(f32::NAN, 0.0, 1.0, 1.0, 0.5).is_finite());
    }
}
