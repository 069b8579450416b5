//! GPS overlay reading.
//!
//! Dashcams burn the current position into the bottom of every frame. This
//! module locates that strip, binarizes it for OCR, runs a `TextRecognizer`, and
//! parses the `Lat ... Long ...` pattern.
//!
//! Reading the overlay never fails a run: OCR errors, garbage text and missing
//! patterns all come back as `None`.

mod ocr;
mod parse;
pub mod preprocess;
mod region;

use serde::{Deserialize, Serialize};

use crate::frame::Frame;

pub use ocr::{ScriptedRecognizer, TesseractCli, TextRecognizer, DEFAULT_TESSERACT_COMMAND};
pub use parse::parse_coordinate;
pub use preprocess::{binarize_for_ocr, DEFAULT_BASE_THRESHOLD};
pub use region::{text_region, DEFAULT_REGION_FRACTION};

/// A WGS84 position read from the overlay.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinate {
    /// Returns `None` unless latitude is in [-90, 90] and longitude in [-180, 180].
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }
        Some(Self {
            latitude,
            longitude,
        })
    }
}

/// Frame -> optional coordinate.
pub struct GpsExtractor {
    recognizer: Box<dyn TextRecognizer>,
    region_fraction: f64,
    base_threshold: u8,
}

impl GpsExtractor {
    pub fn new<R: TextRecognizer + 'static>(recognizer: R) -> Self {
        Self::from_boxed(Box::new(recognizer))
    }

    pub fn from_boxed(recognizer: Box<dyn TextRecognizer>) -> Self {
        Self {
            recognizer,
            region_fraction: DEFAULT_REGION_FRACTION,
            base_threshold: DEFAULT_BASE_THRESHOLD,
        }
    }

    pub fn with_region_fraction(mut self, fraction: f64) -> Self {
        self.region_fraction = fraction;
        self
    }

    pub fn with_base_threshold(mut self, threshold: u8) -> Self {
        self.base_threshold = threshold;
        self
    }

    pub fn recognizer_name(&self) -> &'static str {
        self.recognizer.name()
    }

    /// Locate the overlay strip of `frame` and read a coordinate from it.
    pub fn extract_from_frame(&mut self, frame: &Frame) -> Option<GeoCoordinate> {
        let region = text_region(frame, self.region_fraction);
        let coordinate = self.extract(&region);
        match coordinate {
            Some(c) => log::debug!(
                "frame {}: gps {:.6}, {:.6}",
                frame.index,
                c.latitude,
                c.longitude
            ),
            None => log::debug!("frame {}: gps not found", frame.index),
        }
        coordinate
    }

    /// Read a coordinate from an already-cropped overlay strip.
    pub fn extract(&mut self, region: &image::RgbImage) -> Option<GeoCoordinate> {
        let binary = binarize_for_ocr(region, self.base_threshold);
        let text = match self.recognizer.recognize(&binary) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("{} OCR failed, treating as no gps: {:#}", self.recognizer.name(), e);
                return None;
            }
        };
        log::trace!("ocr text: {:?}", text);
        parse_coordinate(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn coordinate_range_is_checked() {
        assert!(GeoCoordinate::new(90.0, 180.0).is_some());
        assert!(GeoCoordinate::new(-90.0, -180.0).is_some());
        assert!(GeoCoordinate::new(90.1, 0.0).is_none());
        assert!(GeoCoordinate::new(0.0, -180.5).is_none());
        assert!(GeoCoordinate::new(f64::NAN, 0.0).is_none());
    }

    #[test]
    fn extractor_parses_recognized_text() {
        let mut gps = GpsExtractor::new(ScriptedRecognizer::from_texts(["Lat 12.34 Long 56.78"]));
        let frame = Frame::new(0, RgbImage::new(40, 30));
        assert_eq!(
            gps.extract_from_frame(&frame),
            GeoCoordinate::new(12.34, 56.78)
        );
    }

    #[test]
    fn ocr_failure_is_absorbed() {
        let mut gps = GpsExtractor::new(ScriptedRecognizer::new(vec![None]));
        let frame = Frame::new(0, RgbImage::new(40, 30));
        assert_eq!(gps.extract_from_frame(&frame), None);
    }

    #[test]
    fn garbage_text_is_absent_coordinate() {
        let mut gps = GpsExtractor::new(ScriptedRecognizer::from_texts(["#@!~ 0O0 ||"]));
        let frame = Frame::new(0, RgbImage::new(40, 30));
        assert_eq!(gps.extract_from_frame(&frame), None);
    }
}
