//! Targeted capture.
//!
//! - `CaptureController`: per-frame state machine deciding when to screenshot
//!   or record
//! - `CaptureSession`: the mutable state of one camera session, owned by the
//!   caller and passed to every `process_frame` call
//! - `CaptureStore` / `VideoWriter`: the storage sink seam
//!
//! The controller never aborts a session on a storage failure. Failures are
//! logged and reported as `FrameOutcome::CaptureFailed`.

mod controller;
mod store;
mod video;

use anyhow::{anyhow, Result};
use std::fmt;
use std::time::Duration;

use crate::detect::{Detection, DetectionEvent};

pub use controller::{CaptureController, CaptureSession, FrameOutcome};
pub use store::{capture_file_name, next_capture_path, CaptureStore, FilesystemStore};
pub use video::{FfmpegVideoWriter, VideoWriter};

/// Minimum confidence (exclusive) for a detection to count as the target.
pub const CONFIDENCE_THRESHOLD: f32 = 0.6;

/// Fixed wall-clock length of every recording.
pub const RECORDING_DURATION: Duration = Duration::from_secs(5);

/// Frame rate written into every video file, regardless of capture rate.
pub const VIDEO_FPS: u32 = 20;

/// What to do when the target is seen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum CaptureAction {
    Screenshot,
    Video,
}

impl fmt::Display for CaptureAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureAction::Screenshot => f.write_str("screenshot"),
            CaptureAction::Video => f.write_str("video"),
        }
    }
}

/// The object label to watch for. Immutable for a session.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetSpec {
    label: String,
    normalized: String,
    threshold: f32,
}

impl TargetSpec {
    pub fn new(label: &str) -> Result<Self> {
        let label = label.trim();
        if label.is_empty() {
            return Err(anyhow!("target object label cannot be empty"));
        }
        Ok(Self {
            label: label.to_string(),
            normalized: label.to_lowercase(),
            threshold: CONFIDENCE_THRESHOLD,
        })
    }

    /// Label as the user typed it (used in output file names).
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Case-insensitive label comparison, ignoring confidence.
    pub fn matches_label(&self, label: &str) -> bool {
        label.to_lowercase() == self.normalized
    }

    /// Case-insensitive label match above the confidence threshold.
    pub fn matches(&self, detection: &Detection) -> bool {
        detection.confidence > self.threshold && self.matches_label(&detection.label)
    }

    pub fn detected_in(&self, event: &DetectionEvent) -> bool {
        event.iter().any(|d| self.matches(d))
    }
}
