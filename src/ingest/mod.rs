//! Frame ingestion sources.
//!
//! This module provides different sources for frames:
//! - Synthetic scenes (`stub://`), for tests and demos
//! - Still image files (one frame, then end of stream)
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! All sources produce owned `Frame` instances, one per call, and report end
//! of stream as `Ok(None)`. Errors are reserved for device failures.

#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod still;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};
use std::path::Path;

use crate::config::SourceSettings;
use crate::frame::Frame;

pub use still::StillImageSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

/// A pull-based frame producer.
pub trait FrameSource {
    /// Open the underlying device or file.
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    /// Capture the next frame. `Ok(None)` means the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Human-readable origin for logs.
    fn describe(&self) -> String;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Open and connect the source named by `settings.url`.
///
/// - `stub://...` selects the synthetic scene
/// - `/dev/video*` selects a V4L2 device
/// - any other path is read as a still image
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    let url = settings.url.trim();
    if url.is_empty() {
        return Err(anyhow!("frame source url cannot be empty"));
    }
    let mut source: Box<dyn FrameSource> = if url.starts_with("stub://") {
        Box::new(SyntheticSource::new(SyntheticConfig {
            name: url.to_string(),
            width: settings.width,
            height: settings.height,
            target_fps: settings.target_fps,
            max_frames: settings.max_frames,
            ..SyntheticConfig::default()
        }))
    } else if url.starts_with("/dev/video") {
        open_device(settings)?
    } else if url.contains("://") {
        return Err(anyhow!(
            "unsupported frame source '{}' (expected stub://, /dev/video*, or an image path)",
            url
        ));
    } else {
        Box::new(StillImageSource::new(Path::new(url)))
    };
    source.connect()?;
    log::info!("frame source connected: {}", source.describe());
    Ok(source)
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(V4l2Source::new(V4l2Config {
        device: settings.url.clone(),
        target_fps: settings.target_fps,
        width: settings.width,
        height: settings.height,
        max_frames: settings.max_frames,
    })))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    Err(anyhow!(
        "camera {} requires the ingest-v4l2 feature",
        settings.url
    ))
}
