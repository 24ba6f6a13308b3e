use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_SCREENSHOT_DIR: &str = "saved_screenshot";
const DEFAULT_VIDEO_DIR: &str = "saved_video";
const DEFAULT_SOURCE_URL: &str = "stub://camera";
const DEFAULT_SOURCE_FPS: u32 = 20;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_MODEL_PATH: &str = "yolov8n.onnx";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_STUB_LABEL: &str = "person";
const DEFAULT_FFMPEG: &str = "ffmpeg";

const KNOWN_BACKENDS: [&str; 2] = ["stub", "tract"];

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    screenshot_dir: Option<PathBuf>,
    video_dir: Option<PathBuf>,
    ffmpeg_path: Option<PathBuf>,
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_size: Option<u32>,
    stub_label: Option<String>,
    font_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub screenshot_dir: PathBuf,
    pub video_dir: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub source: SourceSettings,
    pub detector: DetectorSettings,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: String,
    /// 0 disables pacing for synthetic sources.
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
    pub max_frames: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: PathBuf,
    pub input_size: u32,
    /// Label reported by the stub backend.
    pub stub_label: String,
    /// Font for box captions. Boxes are drawn without captions when unset.
    pub font_path: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::from_file(CaptureConfigFile::default())
    }
}

impl CaptureConfig {
    /// Defaults, then the JSON file named by `OBJCAP_CONFIG`, then `OBJCAP_*`
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("OBJCAP_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: CaptureConfigFile) -> Self {
        let source = file.source.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        Self {
            screenshot_dir: file
                .screenshot_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SCREENSHOT_DIR)),
            video_dir: file
                .video_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_VIDEO_DIR)),
            ffmpeg_path: file
                .ffmpeg_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FFMPEG)),
            source: SourceSettings {
                url: source
                    .url
                    .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
                target_fps: source.target_fps.unwrap_or(DEFAULT_SOURCE_FPS),
                width: source.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
                height: source.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
                max_frames: source.max_frames,
            },
            detector: DetectorSettings {
                backend: detector
                    .backend
                    .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
                model_path: detector
                    .model_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
                input_size: detector.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
                stub_label: detector
                    .stub_label
                    .unwrap_or_else(|| DEFAULT_STUB_LABEL.to_string()),
                font_path: detector.font_path,
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(dir) = non_empty_env("OBJCAP_SCREENSHOT_DIR") {
            self.screenshot_dir = PathBuf::from(dir);
        }
        if let Some(dir) = non_empty_env("OBJCAP_VIDEO_DIR") {
            self.video_dir = PathBuf::from(dir);
        }
        if let Some(url) = non_empty_env("OBJCAP_SOURCE") {
            self.source.url = url;
        }
        if let Some(frames) = non_empty_env("OBJCAP_MAX_FRAMES") {
            let frames: u64 = frames
                .parse()
                .map_err(|_| anyhow!("OBJCAP_MAX_FRAMES must be a non-negative integer"))?;
            self.source.max_frames = Some(frames);
        }
        if let Some(backend) = non_empty_env("OBJCAP_BACKEND") {
            self.detector.backend = backend;
        }
        if let Some(model) = non_empty_env("OBJCAP_MODEL") {
            self.detector.model_path = PathBuf::from(model);
        }
        if let Some(font) = non_empty_env("OBJCAP_FONT") {
            self.detector.font_path = Some(PathBuf::from(font));
        }
        if let Some(ffmpeg) = non_empty_env("OBJCAP_FFMPEG") {
            self.ffmpeg_path = PathBuf::from(ffmpeg);
        }
        Ok(())
    }

    pub fn validate(&mut self) -> Result<()> {
        if self.screenshot_dir.as_os_str().is_empty() || self.video_dir.as_os_str().is_empty() {
            return Err(anyhow!("capture directories cannot be empty"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be greater than zero"));
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector input size must be greater than zero"));
        }
        self.detector.backend = self.detector.backend.trim().to_lowercase();
        if !KNOWN_BACKENDS.contains(&self.detector.backend.as_str()) {
            return Err(anyhow!(
                "unknown detector backend '{}' (expected one of {})",
                self.detector.backend,
                KNOWN_BACKENDS.join(", ")
            ));
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<CaptureConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_saved_capture_folders() {
        let cfg = CaptureConfig::default();
        assert_eq!(cfg.screenshot_dir, PathBuf::from("saved_screenshot"));
        assert_eq!(cfg.video_dir, PathBuf::from("saved_video"));
        assert_eq!(cfg.source.url, "stub://camera");
        assert_eq!(cfg.detector.backend, "stub");
        assert_eq!(cfg.source.max_frames, None);
    }

    #[test]
    fn validate_rejects_unknown_backend_and_zero_sizes() {
        let mut cfg = CaptureConfig::default();
        cfg.detector.backend = "opencv".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = CaptureConfig::default();
        cfg.source.width = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = CaptureConfig::default();
        cfg.detector.backend = " Tract ".to_string();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.detector.backend, "tract");
    }
}
