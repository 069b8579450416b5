//! YOLO-style output decoding.
//!
//! Single-stage detectors exported to ONNX (YOLOv8 and later) emit one tensor of
//! shape `[1, 4 + classes, anchors]`: rows 0..4 hold box center x, center y,
//! width and height in model-input pixels, the remaining rows hold per-class
//! scores. This module turns that tensor into frame-space `RawDetection`s.

use crate::detect::result::RawDetection;

/// Decoding parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YoloParams {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 100,
        }
    }
}

/// Decode a channel-major `[channels, anchors]` prediction block.
///
/// `scale_x` / `scale_y` map model-input pixels back to frame pixels.
pub fn decode_predictions(
    data: &[f32],
    channels: usize,
    anchors: usize,
    scale_x: f32,
    scale_y: f32,
    params: &YoloParams,
) -> Vec<RawDetection> {
    if channels < 5 || data.len() < channels * anchors {
        return Vec::new();
    }

    let at = |channel: usize, anchor: usize| data[channel * anchors + anchor];

    let mut candidates: Vec<RawDetection> = (0..anchors)
        .filter_map(|a| {
            let score = (4..channels)
                .map(|c| at(c, a))
                .fold(f32::NEG_INFINITY, f32::max);
            if !score.is_finite() || score < params.confidence_threshold {
                return None;
            }
            let (cx, cy, w, h) = (at(0, a), at(1, a), at(2, a), at(3, a));
            Some(RawDetection::new(
                (cx - w / 2.0) * scale_x,
                (cy - h / 2.0) * scale_y,
                (cx + w / 2.0) * scale_x,
                (cy + h / 2.0) * scale_y,
                score,
            ))
        })
        .collect();

    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    non_max_suppression(candidates, params.iou_threshold, params.max_detections)
}

/// Greedy NMS over candidates already sorted by descending confidence.
pub fn non_max_suppression(
    sorted: Vec<RawDetection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<RawDetection> {
    let mut kept: Vec<RawDetection> = Vec::new();
    for candidate in sorted {
        if kept.len() >= max_detections {
            break;
        }
        if kept.iter().all(|k| iou(k, &candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

pub fn iou(a: &RawDetection, b: &RawDetection) -> f32 {
    let ix1 = a.x1.max(b.x1);
    let iy1 = a.y1.max(b.y1);
    let ix2 = a.x2.min(b.x2);
    let iy2 = a.y2.min(b.y2);
    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let area_a = (a.x2 - a.x1).max(0.0) * (a.y2 - a.y1).max(0.0);
    let area_b = (b.x2 - b.x1).max(0.0) * (b.y2 - b.y1).max(0.0);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}
