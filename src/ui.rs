//! Terminal feedback for the scan CLI: stage spinners and a per-frame bar.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use crate::pipeline::FrameProgress;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl std::str::FromStr for UiMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "auto" => Ok(UiMode::Auto),
            "plain" => Ok(UiMode::Plain),
            "pretty" => Ok(UiMode::Pretty),
            other => Err(format!("unknown ui mode '{other}' (auto|plain|pretty)")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Frame counter for a run. The bar is sized from the first progress
    /// report when the container knows its frame count; otherwise it is a
    /// spinner with a running count.
    pub fn frames(&self) -> FrameBar {
        FrameBar {
            pretty: self.use_pretty(),
            bar: None,
            potholes: 0,
        }
    }
}

fn frame_bar(expected: Option<u64>) -> ProgressBar {
    let bar = match expected {
        Some(total) => {
            let bar = ProgressBar::new(total);
            let style = ProgressStyle::with_template(
                "{bar:40.green/white} {pos}/{len} frames ({per_sec}) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            let style = ProgressStyle::with_template("{spinner} {pos} frames ({per_sec}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            bar.set_style(style);
            bar
        }
    };
    bar.set_draw_target(ProgressDrawTarget::stderr());
    bar
}

pub struct FrameBar {
    pretty: bool,
    bar: Option<ProgressBar>,
    potholes: u64,
}

impl FrameBar {
    pub fn update(&mut self, progress: &FrameProgress) {
        self.potholes += progress.detections as u64;
        if self.pretty {
            let bar = self
                .bar
                .get_or_insert_with(|| frame_bar(progress.expected_frames));
            bar.inc(1);
            if progress.detections > 0 {
                bar.set_message(format!("{} potholes", self.potholes));
            }
        } else if progress.detections > 0 {
            eprintln!(
                "    frame {}: {} pothole(s){}",
                progress.index,
                progress.detections,
                if progress.geotagged { "" } else { " (no GPS fix)" }
            );
        }
    }
}

impl Drop for FrameBar {
    fn drop(&mut self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ui_mode_parses_cli_values() {
        assert_eq!("plain".parse::<UiMode>(), Ok(UiMode::Plain));
        assert_eq!("pretty".parse::<UiMode>(), Ok(UiMode::Pretty));
        assert!("fancy".parse::<UiMode>().is_err());
    }

    #[test]
    fn pretty_output_needs_a_terminal() {
        assert!(!Ui::new(UiMode::Pretty, false, false).use_pretty());
        assert!(!Ui::new(UiMode::Auto, true, true).use_pretty());
        assert!(Ui::new(UiMode::Auto, true, false).use_pretty());
    }

    #[test]
    fn frame_bar_is_sized_from_the_first_report() {
        let mut frames = FrameBar {
            pretty: true,
            bar: None,
            potholes: 0,
        };
        frames.update(&FrameProgress {
            index: 0,
            detections: 2,
            geotagged: true,
            expected_frames: Some(48),
        });
        let bar = frames.bar.as_ref().unwrap();
        assert_eq!(bar.length(), Some(48));
        assert_eq!(bar.position(), 1);
        assert_eq!(frames.potholes, 2);
    }

    #[test]
    fn unknown_length_gets_a_spinner() {
        assert_eq!(frame_bar(None).length(), None);
        assert_eq!(frame_bar(Some(3)).length(), Some(3));
    }

    #[test]
    fn plain_mode_never_builds_a_bar() {
        let mut frames = Ui::new(UiMode::Plain, true, false).frames();
        frames.update(&FrameProgress {
            index: 0,
            detections: 0,
            geotagged: false,
            expected_frames: Some(10),
        });
        assert!(frames.bar.is_none());
    }

    #[test]
    fn durations_format_compactly() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
