//! Detection aggregation.
//!
//! - `DetectionLog`: run-scoped, ordered list of geotagged detections. Owned by
//!   the pipeline, reset before the first frame of every run.
//! - `LatestRun`: process-wide handle to the most recent *completed* run. A run
//!   publishes its log exactly once, at completion, by swapping in a new
//!   versioned `Arc<RunSnapshot>`; readers never observe a half-built log.

use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::detect::{BoundingBox, Detection};
use crate::gps::GeoCoordinate;

/// A detection joined with the coordinate read from the same frame.
///
/// Serialized for the map view as `{"lat","lng","confidence","box"}`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeotaggedDetection {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
    pub confidence: f32,
    #[serde(rename = "box")]
    pub bounding_box: BoundingBox,
}

impl GeotaggedDetection {
    pub fn new(detection: &Detection, coordinate: GeoCoordinate) -> Self {
        Self {
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            confidence: detection.confidence,
            bounding_box: detection.bounding_box,
        }
    }
}

/// Ordered geotagged detections for one run.
#[derive(Clone, Debug, Default)]
pub struct DetectionLog {
    entries: Vec<GeotaggedDetection>,
}

impl DetectionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the log. Called once at the start of every run.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Append one entry per detection when `coordinate` is present.
    ///
    /// Without a coordinate the frame's detections cannot be placed on a map and
    /// are dropped from the log (they are still drawn on the output video).
    /// Returns the number of entries appended.
    pub fn record(&mut self, detections: &[Detection], coordinate: Option<GeoCoordinate>) -> usize {
        let Some(coordinate) = coordinate else {
            return 0;
        };
        self.entries.extend(
            detections
                .iter()
                .map(|d| GeotaggedDetection::new(d, coordinate)),
        );
        detections.len()
    }

    /// Current contents, in record order.
    pub fn snapshot(&self) -> Vec<GeotaggedDetection> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON array for the map renderer.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.entries)
            .map_err(|e| anyhow!("failed to serialize detection log: {}", e))
    }
}

/// Immutable result of one completed run.
#[derive(Clone, Debug, Serialize)]
pub struct RunSnapshot {
    /// Monotonic per-`LatestRun` publication counter, starting at 1.
    pub version: u64,
    pub source: String,
    pub frames: u64,
    pub detections: Vec<GeotaggedDetection>,
}

/// Shared handle to the latest completed run's results.
///
/// Cloning the handle shares the same slot.
#[derive(Clone, Default)]
pub struct LatestRun {
    slot: Arc<RwLock<Slot>>,
}

/// Version counter and current snapshot move together under one lock.
#[derive(Default)]
struct Slot {
    version: u64,
    current: Option<Arc<RunSnapshot>>,
}

impl LatestRun {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace the published snapshot. Returns the new version.
    pub fn publish(&self, source: &str, frames: u64, detections: Vec<GeotaggedDetection>) -> Result<u64> {
        let mut guard = self
            .slot
            .write()
            .map_err(|_| anyhow!("latest-run lock poisoned"))?;
        guard.version += 1;
        let version = guard.version;
        guard.current = Some(Arc::new(RunSnapshot {
            version,
            source: source.to_string(),
            frames,
            detections,
        }));
        Ok(version)
    }

    /// The most recently published snapshot, if any run has completed.
    pub fn latest(&self) -> Result<Option<Arc<RunSnapshot>>> {
        let guard = self
            .slot
            .read()
            .map_err(|_| anyhow!("latest-run lock poisoned"))?;
        Ok(guard.current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: u32, confidence: f32) -> Detection {
        Detection {
            bounding_box: BoundingBox::new(x, 0, x + 10, 10),
            confidence,
        }
    }

    fn coord(lat: f64, lng: f64) -> Option<GeoCoordinate> {
        GeoCoordinate::new(lat, lng)
    }

    #[test]
    fn reset_without_records_is_empty() {
        let mut log = DetectionLog::new();
        log.record(&[det(0, 0.5)], coord(1.0, 2.0));
        log.reset();
        assert!(log.snapshot().is_empty());
    }

    #[test]
    fn absent_coordinate_never_grows_log() {
        let mut log = DetectionLog::new();
        assert_eq!(log.record(&[det(0, 0.5), det(20, 0.6)], None), 0);
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn present_coordinate_grows_log_by_detection_count() {
        let mut log = DetectionLog::new();
        log.record(&[det(0, 0.5)], coord(1.0, 2.0));
        let before = log.len();
        assert_eq!(log.record(&[det(1, 0.5), det(2, 0.6), det(3, 0.7)], coord(3.0, 4.0)), 3);
        assert_eq!(log.len(), before + 3);
    }

    #[test]
    fn record_preserves_order_and_shares_frame_coordinate() {
        let mut log = DetectionLog::new();
        log.record(&[det(5, 0.9), det(7, 0.4)], coord(10.0, 20.0));
        log.record(&[det(9, 0.3)], coord(11.0, 21.0));
        let snap = log.snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0].bounding_box.x1, 5);
        assert_eq!(snap[1].bounding_box.x1, 7);
        assert_eq!((snap[1].latitude, snap[1].longitude), (10.0, 20.0));
        assert_eq!((snap[2].latitude, snap[2].longitude), (11.0, 21.0));
    }

    #[test]
    fn serializes_map_payload_shape() {
        let entry = GeotaggedDetection::new(
            &Detection {
                bounding_box: BoundingBox::new(10, 20, 50, 60),
                confidence: 0.83,
            },
            GeoCoordinate::new(12.34, 56.78).unwrap(),
        );
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(
            json,
            r#"{"lat":12.34,"lng":56.78,"confidence":0.83,"box":[10,20,50,60]}"#
        );
    }

    #[test]
    fn latest_run_versions_increase_and_replace() {
        let latest = LatestRun::new();
        assert!(latest.latest().unwrap().is_none());

        let v1 = latest.publish("a.mp4", 3, vec![]).unwrap();
        let reader = latest.clone();
        let first = reader.latest().unwrap().unwrap();

        let v2 = latest.publish("b.mp4", 5, vec![]).unwrap();
        assert_eq!((v1, v2), (1, 2));
        // earlier readers keep their snapshot
        assert_eq!(first.source, "a.mp4");
        assert_eq!(reader.latest().unwrap().unwrap().source, "b.mp4");
    }

    #[test]
    fn concurrent_publishers_leave_the_newest_version_visible() {
        let latest = LatestRun::new();
        let barrier = Arc::new(std::sync::Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let latest = latest.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    (0..50)
                        .map(|_| latest.publish(&format!("run-{i}"), 1, vec![]).unwrap())
                        .max()
                        .unwrap()
                })
            })
            .collect();
        let newest = handles.into_iter().map(|h| h.join().unwrap()).max().unwrap();
        assert_eq!(newest, 200);
        assert_eq!(latest.latest().unwrap().unwrap().version, newest);
    }

    #[test]
    fn to_json_renders_the_map_payload() {
        let mut log = DetectionLog::new();
        log.record(&[det(3, 0.5)], coord(1.5, -2.5));
        let parsed: Vec<GeotaggedDetection> = serde_json::from_str(&log.to_json().unwrap()).unwrap();
        assert_eq!(parsed, log.snapshot());
    }
}
