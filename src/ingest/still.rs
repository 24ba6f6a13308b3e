//! Still image frame source.
//!
//! Decodes one local image file at connect time and yields it as a single
//! frame, then reports end of stream.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

use super::FrameSource;
use crate::frame::Frame;

pub struct StillImageSource {
    path: PathBuf,
    frame: Option<Frame>,
    delivered: bool,
}

impl StillImageSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            frame: None,
            delivered: false,
        }
    }
}

impl FrameSource for StillImageSource {
    fn connect(&mut self) -> Result<()> {
        self.frame = Some(Frame::open(&self.path)?);
        self.delivered = false;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.delivered {
            return Ok(None);
        }
        let frame = self
            .frame
            .take()
            .ok_or_else(|| anyhow!("image source {} not connected", self.path.display()))?;
        self.delivered = true;
        Ok(Some(frame))
    }

    fn describe(&self) -> String {
        format!("image {}", self.path.display())
    }
}
