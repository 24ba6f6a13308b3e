//! Browsing saved captures.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::SystemTime;

pub const SCREENSHOT_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
pub const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "avi", "mov"];

/// Edge of the square thumbnails fit into.
pub const THUMBNAIL_SIZE: u32 = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureKind {
    Screenshot,
    Video,
}

#[derive(Clone, Debug)]
pub struct CaptureEntry {
    pub path: PathBuf,
    pub kind: CaptureKind,
    pub size_bytes: u64,
    pub modified: Option<SystemTime>,
}

impl CaptureEntry {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

pub struct Gallery {
    screenshot_dir: PathBuf,
    video_dir: PathBuf,
    ffmpeg: PathBuf,
}

impl Gallery {
    pub fn new(screenshot_dir: PathBuf, video_dir: PathBuf) -> Self {
        Self {
            screenshot_dir,
            video_dir,
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }

    /// ffmpeg binary used to grab the first frame of a video.
    pub fn with_ffmpeg(mut self, ffmpeg: PathBuf) -> Self {
        self.ffmpeg = ffmpeg;
        self
    }

    pub fn screenshots(&self) -> Result<Vec<CaptureEntry>> {
        list_dir(&self.screenshot_dir, CaptureKind::Screenshot)
    }

    pub fn videos(&self) -> Result<Vec<CaptureEntry>> {
        list_dir(&self.video_dir, CaptureKind::Video)
    }

    /// Remove a capture. Paths outside the two capture directories are refused.
    pub fn delete(&self, path: &Path) -> Result<CaptureKind> {
        let kind = self.classify(path)?;
        fs::remove_file(path).with_context(|| format!("failed to delete {}", path.display()))?;
        log::info!("deleted {}", path.display());
        Ok(kind)
    }

    /// Thumbnail fitting in `THUMBNAIL_SIZE`x`THUMBNAIL_SIZE`, aspect preserved.
    /// Videos use their first frame.
    pub fn thumbnail(&self, path: &Path) -> Result<RgbImage> {
        let full = match self.classify(path)? {
            CaptureKind::Screenshot => image::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?,
            CaptureKind::Video => self.first_video_frame(path)?,
        };
        Ok(full.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE).to_rgb8())
    }

    fn classify(&self, path: &Path) -> Result<CaptureKind> {
        let resolved = path
            .canonicalize()
            .with_context(|| format!("capture {} not found", path.display()))?;
        let parent = resolved
            .parent()
            .ok_or_else(|| anyhow!("{} has no parent directory", path.display()))?;
        let ext = extension(&resolved);
        for (dir, kind, exts) in [
            (&self.screenshot_dir, CaptureKind::Screenshot, &SCREENSHOT_EXTENSIONS),
            (&self.video_dir, CaptureKind::Video, &VIDEO_EXTENSIONS),
        ] {
            let Ok(dir) = dir.canonicalize() else {
                continue;
            };
            if parent == dir && exts.contains(&ext.as_str()) {
                return Ok(kind);
            }
        }
        Err(anyhow!(
            "{} is not a capture in {} or {}",
            path.display(),
            self.screenshot_dir.display(),
            self.video_dir.display()
        ))
    }

    fn first_video_frame(&self, path: &Path) -> Result<image::DynamicImage> {
        let output = Command::new(&self.ffmpeg)
            .args(["-loglevel", "error", "-i"])
            .arg(path)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "pipe:1"])
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to run {}", self.ffmpeg.display()))?;
        if !output.status.success() || output.stdout.is_empty() {
            return Err(anyhow!(
                "could not read first frame of {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        image::load_from_memory(&output.stdout)
            .with_context(|| format!("ffmpeg returned an unreadable frame for {}", path.display()))
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn list_dir(dir: &Path, kind: CaptureKind) -> Result<Vec<CaptureEntry>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let exts: &[&str] = match kind {
        CaptureKind::Screenshot => &SCREENSHOT_EXTENSIONS,
        CaptureKind::Video => &VIDEO_EXTENSIONS,
    };
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !exts.contains(&extension(&path).as_str()) {
            continue;
        }
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        entries.push(CaptureEntry {
            path,
            kind,
            size_bytes: meta.len(),
            modified: meta.modified().ok(),
        });
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}
