//! One-shot run alerts.
//!
//! The pipeline raises two alerts per run: `PotholeDetected` on the first frame
//! with a detection, and `ProcessingComplete` when the output is finalized.
//! Delivery is someone else's problem; a failed delivery is logged and the run
//! carries on.

use std::time::Duration;

use anyhow::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertKind {
    PotholeDetected,
    ProcessingComplete,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub title: &'static str,
    pub message: &'static str,
    /// How long a desktop notifier should keep the alert on screen.
    pub display_for: Duration,
}

impl Alert {
    pub fn pothole_detected() -> Self {
        Self {
            kind: AlertKind::PotholeDetected,
            title: "Alert",
            message: "A pothole has been detected!",
            display_for: Duration::from_secs(2),
        }
    }

    pub fn processing_complete() -> Self {
        Self {
            kind: AlertKind::ProcessingComplete,
            title: "Processing Complete",
            message: "Video has been processed. All potholes detected.",
            display_for: Duration::from_secs(4),
        }
    }
}

/// Alert delivery seam.
pub trait Notifier: Send {
    fn notify(&mut self, alert: &Alert) -> Result<()>;
}

/// Writes alerts to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, alert: &Alert) -> Result<()> {
        log::info!("[{}] {}", alert.title, alert.message);
        Ok(())
    }
}
