use std::sync::OnceLock;

use super::GeoCoordinate;

/// `Lat <number> <non-digits> Long <number>`; tokens are case-sensitive and
/// numbers may carry a leading minus sign.
const OVERLAY_PATTERN: &str = r"Lat\s*(-?\d+(?:\.\d*)?)\D+?Long\s*(-?\d+(?:\.\d*)?)";

/// Parse OCR text into a coordinate.
///
/// Returns `None` when the pattern is missing, a number does not parse, or the
/// values fall outside latitude [-90, 90] / longitude [-180, 180].
pub fn parse_coordinate(text: &str) -> Option<GeoCoordinate> {
    static OVERLAY_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = OVERLAY_RE.get_or_init(|| regex::Regex::new(OVERLAY_PATTERN).unwrap());

    let caps = re.captures(text)?;
    let latitude: f64 = caps.get(1)?.as_str().parse().ok()?;
    let longitude: f64 = caps.get(2)?.as_str().parse().ok()?;
    GeoCoordinate::new(latitude, longitude)
}
