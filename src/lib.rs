//! Object capture
//!
//! Watches a camera feed for one named object and, when it appears, either
//! saves a single screenshot or records a fixed 5 second video clip.
//!
//! # Module Structure
//!
//! - `frame`: owned RGB frames
//! - `ingest`: frame sources (synthetic, still image, V4L2)
//! - `detect`: the detector seam and its backends
//! - `capture`: the per-frame capture state machine and its storage sink
//! - `runner`: the single-threaded driving loops
//! - `display`: console output and the exit signal
//! - `gallery`: listing, deleting and thumbnailing saved captures
//! - `config`: JSON file plus environment configuration

pub mod capture;
pub mod config;
pub mod detect;
pub mod display;
pub mod frame;
pub mod gallery;
pub mod ingest;
pub mod runner;

pub use capture::{
    CaptureAction, CaptureController, CaptureSession, CaptureStore, FilesystemStore,
    FrameOutcome, TargetSpec, VideoWriter,
};
pub use config::CaptureConfig;
pub use detect::{BoundingBox, Detection, DetectionEvent, Detector, Inference};
pub use display::{ConsoleDisplay, Display, ExitSignal, Overlay, UiMode};
pub use frame::Frame;
pub use gallery::{CaptureEntry, CaptureKind, Gallery};
pub use ingest::FrameSource;
pub use runner::{SessionEnd, SessionSummary};
