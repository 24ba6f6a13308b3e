use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::video::{FfmpegVideoWriter, VideoWriter};
use crate::frame::Frame;

/// Storage sink for captures.
pub trait CaptureStore {
    /// Write `frame` as a new screenshot and return its path.
    fn save_screenshot(&mut self, label: &str, frame: &Frame) -> Result<PathBuf>;

    /// Open a new video file sized `width`x`height` at `fps`.
    fn open_video(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<(PathBuf, Box<dyn VideoWriter>)>;
}

/// Screenshots as JPEG files and videos as MP4 files in two local directories.
#[derive(Clone, Debug)]
pub struct FilesystemStore {
    screenshot_dir: PathBuf,
    video_dir: PathBuf,
    ffmpeg: PathBuf,
}

impl FilesystemStore {
    pub fn new(screenshot_dir: PathBuf, video_dir: PathBuf, ffmpeg: PathBuf) -> Self {
        Self {
            screenshot_dir,
            video_dir,
            ffmpeg,
        }
    }

    pub fn screenshot_dir(&self) -> &Path {
        &self.screenshot_dir
    }

    pub fn video_dir(&self) -> &Path {
        &self.video_dir
    }
}

impl CaptureStore for FilesystemStore {
    fn save_screenshot(&mut self, label: &str, frame: &Frame) -> Result<PathBuf> {
        let path = next_capture_path(&self.screenshot_dir, "screenshot", label, "jpg")?;
        frame
            .image()
            .save_with_format(&path, image::ImageFormat::Jpeg)
            .with_context(|| format!("failed to write screenshot {}", path.display()))?;
        Ok(path)
    }

    fn open_video(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<(PathBuf, Box<dyn VideoWriter>)> {
        let path = next_capture_path(&self.video_dir, "video", label, "mp4")?;
        let writer = FfmpegVideoWriter::spawn(&self.ffmpeg, &path, width, height, fps)?;
        Ok((path, Box::new(writer)))
    }
}

/// `<kind>_<label>_<n>.<ext>` with path separators and whitespace in the label
/// replaced by `_`.
pub fn capture_file_name(kind: &str, label: &str, n: usize, ext: &str) -> String {
    let label: String = label
        .chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, '/' | '\\' | ':' | '.') {
                '_'
            } else {
                c
            }
        })
        .collect();
    format!("{}_{}_{}.{}", kind, label, n, ext)
}

/// Next free capture path in `dir`, creating the directory if needed.
///
/// `<n>` starts at the number of entries already in the directory. Deletions
/// can make that name collide with an existing file, so it is bumped until
/// free.
pub fn next_capture_path(dir: &Path, kind: &str, label: &str, ext: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create capture directory {}", dir.display()))?;
    let mut n = fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .count();
    loop {
        let path = dir.join(capture_file_name(kind, label, n, ext));
        if !path.exists() {
            return Ok(path);
        }
        n += 1;
    }
}
