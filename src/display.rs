use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::capture::FrameOutcome;
use crate::frame::Frame;

/// Per-frame status shown next to the live frame.
#[derive(Clone, Debug)]
pub struct Overlay<'a> {
    /// Number of objects the detector reported.
    pub detections: usize,
    pub target_present: bool,
    pub recording: bool,
    pub outcome: &'a FrameOutcome,
}

/// Live output for the driving loop.
pub trait Display {
    fn show(&mut self, frame: &Frame, overlay: &Overlay<'_>) -> Result<()>;

    /// Polled once per iteration, after `show`.
    fn exit_requested(&mut self) -> bool;
}

/// Cooperative exit flag, set from a signal handler or by the caller.
#[derive(Clone, Debug, Default)]
pub struct ExitSignal {
    flag: Arc<AtomicBool>,
}

impl ExitSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route Ctrl-C to this flag. May only be installed once per process.
    pub fn install_ctrlc(&self) -> Result<()> {
        let flag = self.flag.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

/// Terminal display: a spinner on a TTY, periodic log lines otherwise.
pub struct ConsoleDisplay {
    spinner: Option<ProgressBar>,
    exit: ExitSignal,
    frames: u64,
    started: Instant,
    plain_every: u64,
}

impl ConsoleDisplay {
    pub fn new(mode: UiMode, is_tty: bool, exit: ExitSignal) -> Self {
        let use_pretty = is_tty
            && match mode {
                UiMode::Pretty | UiMode::Auto => true,
                UiMode::Plain => false,
            };
        let spinner = use_pretty.then(|| {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} [{elapsed}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner
        });
        Self {
            spinner,
            exit,
            frames: 0,
            started: Instant::now(),
            plain_every: 20,
        }
    }

    fn status_line(&self, frame: &Frame, overlay: &Overlay<'_>) -> String {
        let mut line = format!(
            "frame {} {}x{} | total: {}",
            frame.index,
            frame.width(),
            frame.height(),
            overlay.detections
        );
        if overlay.target_present {
            line.push_str(" | target in view");
        }
        if overlay.recording {
            line.push_str(" | REC");
        }
        line.push_str(" | Ctrl-C to exit");
        line
    }
}

impl Display for ConsoleDisplay {
    fn show(&mut self, frame: &Frame, overlay: &Overlay<'_>) -> Result<()> {
        self.frames += 1;
        let line = self.status_line(frame, overlay);
        match &self.spinner {
            Some(spinner) => {
                if let Some(event) = describe_outcome(overlay.outcome) {
                    spinner.println(event);
                }
                spinner.set_message(line);
            }
            None => {
                if let Some(event) = describe_outcome(overlay.outcome) {
                    eprintln!("{}", event);
                }
                if self.frames % self.plain_every == 1 {
                    eprintln!("{}", line);
                }
            }
        }
        Ok(())
    }

    fn exit_requested(&mut self) -> bool {
        self.exit.is_set()
    }
}

impl Drop for ConsoleDisplay {
    fn drop(&mut self) {
        let message = format!(
            "✔ {} frames ({})",
            self.frames,
            format_duration(self.started.elapsed())
        );
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn describe_outcome(outcome: &FrameOutcome) -> Option<String> {
    match outcome {
        FrameOutcome::Idle | FrameOutcome::RecordingContinuing => None,
        FrameOutcome::ScreenshotWritten(path) => {
            Some(format!("screenshot saved at {}", path.display()))
        }
        FrameOutcome::RecordingStarted(path) => Some(format!("recording {}", path.display())),
        FrameOutcome::RecordingStopped(path) => {
            Some(format!("recording stopped: {}", path.display()))
        }
        FrameOutcome::CaptureFailed(reason) => Some(format!("capture failed: {}", reason)),
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
    use std::path::PathBuf;

    #[test]
    fn exit_signal_is_shared_between_clones() {
        let signal = ExitSignal::new();
        let mut display = ConsoleDisplay::new(UiMode::Plain, false, signal.clone());
        assert!(!display.exit_requested());
        signal.trigger();
        assert!(display.exit_requested());
    }

    #[test]
    fn outcome_descriptions_skip_quiet_frames() {
        assert_eq!(describe_outcome(&FrameOutcome::Idle), None);
        assert_eq!(describe_outcome(&FrameOutcome::RecordingContinuing), None);
        let shot = FrameOutcome::ScreenshotWritten(PathBuf::from("a.jpg"));
        assert_eq!(
            describe_outcome(&shot).as_deref(),
            Some("screenshot saved at a.jpg")
        );
    }

    #[test]
    fn status_line_flags_recording() {
        let display = ConsoleDisplay::new(UiMode::Plain, false, ExitSignal::new());
        let frame = Frame::filled(4, 2, [0, 0, 0]).with_index(3);
        let outcome = FrameOutcome::RecordingContinuing;
        let overlay = Overlay {
            detections: 2,
            target_present: true,
            recording: true,
            outcome: &outcome,
        };
        assert_eq!(
            display.status_line(&frame, &overlay),
            "frame 3 4x2 | total: 2 | target in view | REC | Ctrl-C to exit"
        );
    }
}
