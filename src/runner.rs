//! Driving loops.
//!
//! One iteration pulls a frame, runs inference, advances the capture state
//! machine, updates the display and polls for exit, strictly in that order.
//! Everything runs on the calling thread. Exit is only observed between
//! iterations.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::capture::{CaptureController, CaptureStore, FrameOutcome};
use crate::detect::{DetectionEvent, Detector, Inference};
use crate::display::{Display, Overlay};
use crate::frame::Frame;
use crate::ingest::FrameSource;

/// Why a session loop stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    ExitRequested,
    SourceExhausted,
    SourceFailed(String),
    DetectorFailed(String),
    DisplayFailed(String),
}

impl SessionEnd {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SessionEnd::SourceFailed(_) | SessionEnd::DetectorFailed(_) | SessionEnd::DisplayFailed(_)
        )
    }
}

#[derive(Clone, Debug)]
pub struct SessionSummary {
    pub frames: u64,
    pub screenshots: Vec<PathBuf>,
    pub videos: Vec<PathBuf>,
    pub capture_failures: u64,
    pub end: SessionEnd,
}

impl SessionSummary {
    fn new() -> Self {
        Self {
            frames: 0,
            screenshots: Vec::new(),
            videos: Vec::new(),
            capture_failures: 0,
            end: SessionEnd::SourceExhausted,
        }
    }

    fn record(&mut self, outcome: &FrameOutcome) {
        match outcome {
            FrameOutcome::ScreenshotWritten(path) => self.screenshots.push(path.clone()),
            // a video only counts once it was finalized
            FrameOutcome::RecordingStopped(path) => self.videos.push(path.clone()),
            FrameOutcome::CaptureFailed(_) => self.capture_failures += 1,
            FrameOutcome::Idle
            | FrameOutcome::RecordingStarted(_)
            | FrameOutcome::RecordingContinuing => {}
        }
    }
}

struct Step {
    outcome: FrameOutcome,
    target_present: bool,
    recording: bool,
}

fn drive<C, F>(
    source: &mut dyn FrameSource,
    detector: &mut dyn Detector,
    display: &mut dyn Display,
    mut clock: C,
    mut step: F,
) -> SessionSummary
where
    C: FnMut() -> Instant,
    F: FnMut(&Inference, Instant) -> Step,
{
    let mut summary = SessionSummary::new();
    summary.end = loop {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("frame source {} exhausted", source.describe());
                break SessionEnd::SourceExhausted;
            }
            Err(err) => {
                log::error!("frame source {} failed: {:#}", source.describe(), err);
                break SessionEnd::SourceFailed(format!("{:#}", err));
            }
        };

        let inference = match detector.infer(&frame) {
            Ok(inference) => inference,
            Err(err) => {
                log::error!("detector {} failed: {:#}", detector.name(), err);
                break SessionEnd::DetectorFailed(format!("{:#}", err));
            }
        };

        let now = clock();
        let Step {
            outcome,
            target_present,
            recording,
        } = step(&inference, now);
        summary.frames += 1;
        summary.record(&outcome);
        log::debug!(
            "frame {}: {} detections -> {:?}",
            frame.index,
            inference.event.len(),
            outcome
        );

        let overlay = Overlay {
            detections: inference.event.len(),
            target_present,
            recording,
            outcome: &outcome,
        };
        if let Err(err) = display.show(&inference.annotated, &overlay) {
            log::error!("display failed: {:#}", err);
            break SessionEnd::DisplayFailed(format!("{:#}", err));
        }

        if display.exit_requested() {
            log::info!("exit requested, closing camera session");
            break SessionEnd::ExitRequested;
        }
    };
    summary
}

/// Run a targeted capture session until exit, end of stream, or failure.
pub fn run_capture<S: CaptureStore>(
    source: &mut dyn FrameSource,
    detector: &mut dyn Detector,
    display: &mut dyn Display,
    controller: &mut CaptureController<S>,
) -> SessionSummary {
    run_capture_with_clock(source, detector, display, controller, Instant::now)
}

/// `run_capture` with an injected clock, called once per frame.
pub fn run_capture_with_clock<S, C>(
    source: &mut dyn FrameSource,
    detector: &mut dyn Detector,
    display: &mut dyn Display,
    controller: &mut CaptureController<S>,
    clock: C,
) -> SessionSummary
where
    S: CaptureStore,
    C: FnMut() -> Instant,
{
    let mut session = controller.initialize();
    let mut summary = drive(source, detector, display, clock, |inference, now| {
        let outcome =
            controller.process_frame(&mut session, &inference.annotated, &inference.event, now);
        Step {
            outcome,
            target_present: controller.target().detected_in(&inference.event),
            recording: session.is_recording(),
        }
    });
    if let Some(outcome) = controller.shutdown(&mut session) {
        log::info!("closed open recording on session end: {:?}", outcome);
        summary.record(&outcome);
    }
    log::info!(
        "capture session ended ({:?}): {} frames, {} screenshots, {} videos, {} failed captures",
        summary.end,
        summary.frames,
        summary.screenshots.len(),
        summary.videos.len(),
        summary.capture_failures
    );
    summary
}

/// Minimum confidence for boxes on the live screen.
pub const LIVE_CONFIDENCE: f32 = 0.8;

/// Live detection with no capture. Only detections at or above
/// [`LIVE_CONFIDENCE`] are shown.
pub fn run_live(
    source: &mut dyn FrameSource,
    detector: &mut dyn Detector,
    display: &mut dyn Display,
) -> SessionSummary {
    detector.set_min_confidence(LIVE_CONFIDENCE);
    let summary = drive(source, detector, display, Instant::now, |_, _| Step {
        outcome: FrameOutcome::Idle,
        target_present: false,
        recording: false,
    });
    log::info!(
        "live session ended ({:?}) after {} frames",
        summary.end,
        summary.frames
    );
    summary
}

/// Run detection on one image file and write the annotated result to `output`.
pub fn detect_image(
    detector: &mut dyn Detector,
    input: &Path,
    output: &Path,
) -> Result<DetectionEvent> {
    let frame = Frame::open(input)?;
    let inference = detector.infer(&frame)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    inference
        .annotated
        .image()
        .save(output)
        .with_context(|| format!("failed to write annotated image {}", output.display()))?;
    log::info!(
        "{}: {} objects, annotated image at {}",
        input.display(),
        inference.event.len(),
        output.display()
    );
    Ok(inference.event)
}
