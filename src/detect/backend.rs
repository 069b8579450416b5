use anyhow::Result;

use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Detector backend trait.
///
/// A backend wraps one pretrained model and runs it in inference-only mode.
/// Implementations:
/// - Must treat the frame as read-only (it is borrowed immutably)
/// - Must tolerate frames with nothing in them (return an empty vector)
/// - Report boxes in frame pixel coordinates; normalization happens in `Detector`
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
