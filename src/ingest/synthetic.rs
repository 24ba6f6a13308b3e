//! Synthetic frame source (`stub://`).
//!
//! Renders a moving background pattern. A marker object, a solid square of
//! `MARKER_RGB`, enters the scene for `presence_frames` frames and then leaves
//! for the same number of frames, repeating. The stub detector reports the
//! marker, which drives the capture logic end to end without a camera or a
//! model.

use anyhow::Result;
use std::time::{Duration, Instant};

use super::FrameSource;
use crate::frame::Frame;

/// Colour of the synthetic marker object. Never produced by the background.
pub const MARKER_RGB: [u8; 3] = [255, 0, 255];

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Frames per second to pace at. 0 disables pacing.
    pub target_fps: u32,
    /// Report end of stream after this many frames.
    pub max_frames: Option<u64>,
    /// Length of each present/absent phase in frames.
    pub presence_frames: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "stub://camera".to_string(),
            width: 640,
            height: 480,
            target_fps: 0,
            max_frames: None,
            presence_frames: 30,
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
    last_frame_at: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            last_frame_at: None,
        }
    }

    /// Frames produced so far.
    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    /// Whether frame number `index` (0-based) carries the marker.
    pub fn marker_present(&self, index: u64) -> bool {
        let phase = self.config.presence_frames.max(1);
        (index / phase) % 2 == 1
    }

    fn pace(&mut self) {
        if self.config.target_fps == 0 {
            return;
        }
        let interval = Duration::from_secs(1) / self.config.target_fps;
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }

    fn render(&self, index: u64) -> Result<Frame> {
        let (width, height) = (self.config.width, self.config.height);
        let pixel_count = (width as usize) * (height as usize) * 3;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + index) % 256) as u8;
        }

        if self.marker_present(index) && width > 0 && height > 0 {
            let side = (width.min(height) / 4).max(1);
            let travel = width.saturating_sub(side).max(1);
            let x0 = ((index * 4) % travel as u64) as u32;
            let y0 = (height - side) / 2;
            for y in y0..y0 + side {
                for x in x0..x0 + side {
                    let offset = ((y * width + x) * 3) as usize;
                    pixels[offset..offset + 3].copy_from_slice(&MARKER_RGB);
                }
            }
        }

        Frame::from_rgb(pixels, width, height)
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            self.config.name,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(max) = self.config.max_frames {
            if self.frame_count >= max {
                return Ok(None);
            }
        }
        self.pace();
        let index = self.frame_count;
        let frame = self.render(index)?.with_index(index);
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn describe(&self) -> String {
        format!("{} (synthetic)", self.config.name)
    }
}
