//! objcap - detect a chosen object on a camera feed and capture it

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use object_capture::capture::{CaptureAction, CaptureController, FilesystemStore, TargetSpec};
use object_capture::config::CaptureConfig;
use object_capture::detect::{self, labels::format_label_lines};
use object_capture::display::{ConsoleDisplay, ExitSignal, UiMode};
use object_capture::gallery::{CaptureEntry, Gallery, THUMBNAIL_SIZE};
use object_capture::ingest;
use object_capture::runner::{self, SessionSummary};

#[derive(Parser, Debug)]
#[command(name = "objcap", about = "Detect a specific object and save screenshots or videos")]
struct Args {
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, global = true, value_enum, default_value_t = UiMode::Auto, value_name = "MODE")]
    ui: UiMode,

    /// Frame source: stub://<name>, /dev/videoN, or an image path
    #[arg(long, global = true)]
    source: Option<String>,

    /// Detector backend (stub|tract)
    #[arg(long, global = true)]
    backend: Option<String>,

    /// ONNX model for the tract backend
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch for one object and capture it on sight
    Capture {
        /// Label to watch for, e.g. "person" or "cat"
        #[arg(long)]
        object: String,
        #[arg(long, value_enum, default_value_t = CaptureAction::Screenshot)]
        action: CaptureAction,
        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<u64>,
    },

    /// Live detection with an object count, no capture
    Live {
        #[arg(long)]
        max_frames: Option<u64>,
    },

    /// Detect objects in one image and write an annotated copy
    DetectImage {
        input: PathBuf,
        /// Defaults to <input>_detected.<ext>
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Browse saved screenshots and videos
    Gallery {
        #[command(subcommand)]
        action: GalleryCommand,
    },

    /// Print the labels the detector can report
    Labels {
        #[arg(long, default_value_t = 5)]
        per_line: usize,
    },
}

#[derive(Subcommand, Debug)]
enum GalleryCommand {
    /// List saved captures
    List,
    /// Delete one saved capture
    Delete { path: PathBuf },
    /// Write a thumbnail of a saved capture
    Thumbnail {
        path: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = CaptureConfig::load()?;
    if let Some(source) = &args.source {
        cfg.source.url = source.clone();
    }
    if let Some(backend) = &args.backend {
        cfg.detector.backend = backend.clone();
    }
    if let Some(model) = &args.model {
        cfg.detector.model_path = model.clone();
    }

    match args.command {
        Command::Capture {
            object,
            action,
            max_frames,
        } => {
            if max_frames.is_some() {
                cfg.source.max_frames = max_frames;
            }
            cfg.validate()?;
            capture(&cfg, args.ui, &object, action)
        }
        Command::Live { max_frames } => {
            if max_frames.is_some() {
                cfg.source.max_frames = max_frames;
            }
            cfg.validate()?;
            live(&cfg, args.ui)
        }
        Command::DetectImage { input, out } => {
            cfg.validate()?;
            let out = out.unwrap_or_else(|| detected_path(&input));
            let mut detector = detect::build_detector(&cfg.detector)?;
            let event = runner::detect_image(detector.as_mut(), &input, &out)?;
            println!("Total: {}", event.len());
            for detection in event.iter() {
                println!("{} {:.2}", detection.label, detection.confidence);
            }
            println!("annotated image: {}", out.display());
            Ok(())
        }
        Command::Gallery { action } => {
            let gallery = Gallery::new(cfg.screenshot_dir.clone(), cfg.video_dir.clone())
                .with_ffmpeg(cfg.ffmpeg_path.clone());
            gallery_command(&gallery, action)
        }
        Command::Labels { per_line } => {
            if per_line == 0 {
                return Err(anyhow!("--per-line must be at least 1"));
            }
            cfg.validate()?;
            let detector = detect::build_detector(&cfg.detector)?;
            for line in format_label_lines(&detector.labels(), per_line) {
                println!("{}", line);
            }
            Ok(())
        }
    }
}

fn console(mode: UiMode) -> Result<ConsoleDisplay> {
    let exit = ExitSignal::new();
    exit.install_ctrlc()?;
    Ok(ConsoleDisplay::new(mode, std::io::stderr().is_terminal(), exit))
}

fn capture(cfg: &CaptureConfig, mode: UiMode, object: &str, action: CaptureAction) -> Result<()> {
    let target = TargetSpec::new(object)?;
    let mut detector = detect::build_detector(&cfg.detector)?;
    if !detector
        .labels()
        .iter()
        .any(|label| target.matches_label(label))
    {
        log::warn!(
            "detector '{}' never reports '{}'; nothing will be captured",
            detector.name(),
            target.label()
        );
    }
    let mut source = ingest::open_source(&cfg.source)?;
    let store = FilesystemStore::new(
        cfg.screenshot_dir.clone(),
        cfg.video_dir.clone(),
        cfg.ffmpeg_path.clone(),
    );
    let mut controller = CaptureController::new(target, action, store);
    let summary = {
        let mut display = console(mode)?;
        runner::run_capture(
            source.as_mut(),
            detector.as_mut(),
            &mut display,
            &mut controller,
        )
    };
    for path in summary.screenshots.iter().chain(summary.videos.iter()) {
        println!("{}", path.display());
    }
    finish(summary)
}

fn live(cfg: &CaptureConfig, mode: UiMode) -> Result<()> {
    let mut detector = detect::build_detector(&cfg.detector)?;
    let mut source = ingest::open_source(&cfg.source)?;
    let summary = {
        let mut display = console(mode)?;
        runner::run_live(source.as_mut(), detector.as_mut(), &mut display)
    };
    finish(summary)
}

fn finish(summary: SessionSummary) -> Result<()> {
    if summary.end.is_failure() {
        return Err(anyhow!("session ended early: {:?}", summary.end));
    }
    Ok(())
}

fn gallery_command(gallery: &Gallery, action: GalleryCommand) -> Result<()> {
    match action {
        GalleryCommand::List => {
            print_entries("screenshots", &gallery.screenshots()?);
            print_entries("videos", &gallery.videos()?);
            Ok(())
        }
        GalleryCommand::Delete { path } => {
            gallery.delete(&path)?;
            println!("deleted {}", path.display());
            Ok(())
        }
        GalleryCommand::Thumbnail { path, out } => {
            let thumb = gallery.thumbnail(&path)?;
            thumb
                .save(&out)
                .with_context(|| format!("failed to write thumbnail {}", out.display()))?;
            println!(
                "{}x{} thumbnail (max {}) written to {}",
                thumb.width(),
                thumb.height(),
                THUMBNAIL_SIZE,
                out.display()
            );
            Ok(())
        }
    }
}

fn print_entries(title: &str, entries: &[CaptureEntry]) {
    println!("{} ({}):", title, entries.len());
    if entries.is_empty() {
        println!("  (none)");
    }
    for entry in entries {
        println!("  {}  {} bytes", entry.path.display(), entry.size_bytes);
    }
}

fn detected_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    input.with_file_name(format!("{}_detected.{}", stem, ext))
}
