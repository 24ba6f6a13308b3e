use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::store::CaptureStore;
use super::video::VideoWriter;
use super::{CaptureAction, TargetSpec, RECORDING_DURATION, VIDEO_FPS};
use crate::detect::DetectionEvent;
use crate::frame::Frame;

/// What a single `process_frame` call did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Nothing captured and no recording in progress.
    Idle,
    ScreenshotWritten(PathBuf),
    RecordingStarted(PathBuf),
    /// A recording is in progress and received this frame.
    RecordingContinuing,
    RecordingStopped(PathBuf),
    /// The storage sink failed. The session continues.
    CaptureFailed(String),
}

struct Recording {
    path: PathBuf,
    deadline: Instant,
    writer: Box<dyn VideoWriter>,
    frames_written: u64,
    dropped_frames: u64,
}

/// Mutable state for one camera session.
///
/// A recording's writer lives inside the session, so "writer open" and
/// "recording" cannot disagree. Dropping the session closes any open
/// recording.
pub struct CaptureSession {
    object_in_frame: bool,
    recording: Option<Recording>,
}

impl CaptureSession {
    fn new() -> Self {
        Self {
            object_in_frame: false,
            recording: None,
        }
    }

    /// True while the target has been seen and not yet lost.
    pub fn object_in_frame(&self) -> bool {
        self.object_in_frame
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn recording_path(&self) -> Option<&Path> {
        self.recording.as_ref().map(|r| r.path.as_path())
    }

    pub fn recording_deadline(&self) -> Option<Instant> {
        self.recording.as_ref().map(|r| r.deadline)
    }

    /// Close the open recording, if any.
    ///
    /// Returns `RecordingStopped` when the video was finalized and
    /// `CaptureFailed` when it was not. Safe to call repeatedly; only the
    /// first call after a recording started closes anything.
    pub fn shutdown(&mut self) -> Option<FrameOutcome> {
        self.recording
            .take()
            .map(|recording| stopped_outcome(close_recording(recording)))
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some(outcome) = self.shutdown() {
            log::warn!("capture session dropped mid-recording: {:?}", outcome);
        }
    }
}

fn close_recording(recording: Recording) -> Result<PathBuf> {
    let Recording {
        path,
        writer,
        frames_written,
        dropped_frames,
        ..
    } = recording;
    let encoded = writer
        .finish()
        .with_context(|| format!("failed to finalize video {}", path.display()))?;
    if frames_written == 0 {
        return Err(anyhow!(
            "no frames reached video {} ({} dropped)",
            path.display(),
            dropped_frames
        ));
    }
    log::info!(
        "video saved at {} ({} frames, {} dropped)",
        path.display(),
        encoded,
        dropped_frames
    );
    Ok(path)
}

fn stopped_outcome(closed: Result<PathBuf>) -> FrameOutcome {
    match closed {
        Ok(path) => FrameOutcome::RecordingStopped(path),
        Err(err) => {
            log::warn!("recording failed: {:#}", err);
            FrameOutcome::CaptureFailed(format!("{:#}", err))
        }
    }
}

/// Per-frame capture state machine for one target and one action.
pub struct CaptureController<S> {
    target: TargetSpec,
    action: CaptureAction,
    store: S,
    recording_duration: Duration,
}

impl<S: CaptureStore> CaptureController<S> {
    pub fn new(target: TargetSpec, action: CaptureAction, store: S) -> Self {
        Self {
            target,
            action,
            store,
            recording_duration: RECORDING_DURATION,
        }
    }

    pub fn target(&self) -> &TargetSpec {
        &self.target
    }

    /// Start a fresh session: target not in frame, not recording.
    pub fn initialize(&self) -> CaptureSession {
        log::info!(
            "capture session started: target '{}' (confidence > {}), action {}",
            self.target.label(),
            self.target.threshold(),
            self.action
        );
        CaptureSession::new()
    }

    /// Advance the session by one frame.
    ///
    /// `frame` is what gets stored (normally the annotated frame) and `now`
    /// is the frame's timestamp.
    pub fn process_frame(
        &mut self,
        session: &mut CaptureSession,
        frame: &Frame,
        event: &DetectionEvent,
        now: Instant,
    ) -> FrameOutcome {
        let detected = self.target.detected_in(event);
        let mut outcome = FrameOutcome::Idle;

        if detected {
            match self.action {
                CaptureAction::Screenshot if !session.object_in_frame => {
                    outcome = self.take_screenshot(frame);
                    // a failed write still consumes this occurrence
                    session.object_in_frame = true;
                }
                CaptureAction::Video if session.recording.is_none() => {
                    outcome = self.start_recording(session, frame, now);
                }
                _ => {}
            }
        }

        let mut stop = false;
        if let Some(recording) = session.recording.as_mut() {
            match recording.writer.write_frame(frame) {
                Ok(()) => recording.frames_written += 1,
                Err(err) => {
                    recording.dropped_frames += 1;
                    log::warn!(
                        "dropping frame {} from {}: {:#}",
                        frame.index,
                        recording.path.display(),
                        err
                    );
                }
            }
            if outcome == FrameOutcome::Idle {
                outcome = FrameOutcome::RecordingContinuing;
            }
            if now >= recording.deadline {
                log::info!("{:?} passed, stopping recording", self.recording_duration);
                stop = true;
            } else if !recording.writer.is_open() {
                log::warn!(
                    "encoder for {} is gone, ending recording early",
                    recording.path.display()
                );
                stop = true;
            }
        }
        if stop {
            if let Some(closed) = session.shutdown() {
                outcome = closed;
            }
        }

        if !detected {
            session.object_in_frame = false;
        }
        outcome
    }

    /// Close any open recording. Idempotent.
    pub fn shutdown(&mut self, session: &mut CaptureSession) -> Option<FrameOutcome> {
        session.shutdown()
    }

    fn take_screenshot(&mut self, frame: &Frame) -> FrameOutcome {
        match self.store.save_screenshot(self.target.label(), frame) {
            Ok(path) => {
                log::info!("screenshot saved at {}", path.display());
                FrameOutcome::ScreenshotWritten(path)
            }
            Err(err) => {
                log::warn!("failed to save screenshot: {:#}", err);
                FrameOutcome::CaptureFailed(format!("{:#}", err))
            }
        }
    }

    fn start_recording(
        &mut self,
        session: &mut CaptureSession,
        frame: &Frame,
        now: Instant,
    ) -> FrameOutcome {
        match self.store.open_video(
            self.target.label(),
            frame.width(),
            frame.height(),
            VIDEO_FPS,
        ) {
            Ok((path, writer)) => {
                log::info!(
                    "recording {} for {:?}",
                    path.display(),
                    self.recording_duration
                );
                session.recording = Some(Recording {
                    path: path.clone(),
                    deadline: now + self.recording_duration,
                    writer,
                    frames_written: 0,
                    dropped_frames: 0,
                });
                FrameOutcome::RecordingStarted(path)
            }
            Err(err) => {
                log::warn!("failed to open video: {:#}", err);
                FrameOutcome::CaptureFailed(format!("{:#}", err))
            }
        }
    }
}
