use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};

use crate::frame::Frame;

/// An open video file.
///
/// `finish` consumes the writer, so a recording can only be closed once.
/// Implementations must also release the file on drop when `finish` was never
/// called.
pub trait VideoWriter {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// False once the encoder behind the file has gone away. Further writes
    /// can only fail.
    fn is_open(&mut self) -> bool {
        true
    }

    /// Flush and close the file. Returns the number of frames written.
    fn finish(self: Box<Self>) -> Result<u64>;
}

/// Encodes MP4 by piping raw RGB frames into an `ffmpeg` child process.
pub struct FfmpegVideoWriter {
    path: PathBuf,
    width: u32,
    height: u32,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    frames: u64,
}

impl FfmpegVideoWriter {
    pub fn spawn(ffmpeg: &Path, path: &Path, width: u32, height: u32, fps: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("cannot record a {}x{} video", width, height));
        }
        log::debug!(
            "spawning {}: {}x{} @ {} fps -> {}",
            ffmpeg.display(),
            width,
            height,
            fps,
            path.display()
        );
        let mut child = Command::new(ffmpeg)
            .args(["-y", "-loglevel", "error"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", &format!("{}x{}", width, height)])
            .args(["-r", &fps.to_string()])
            .args(["-i", "pipe:0"])
            // yuv420p needs even dimensions
            .args(["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2"])
            .args(["-c:v", "mpeg4", "-q:v", "5", "-pix_fmt", "yuv420p"])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn {}", ffmpeg.display()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("ffmpeg stdin was not captured"))?;
        Ok(Self {
            path: path.to_path_buf(),
            width,
            height,
            child: Some(child),
            stdin: Some(stdin),
            frames: 0,
        })
    }

    fn encoder_exit(&mut self) -> Option<ExitStatus> {
        self.child
            .as_mut()
            .and_then(|child| child.try_wait().ok().flatten())
    }

    fn close(&mut self) -> Result<()> {
        // closing stdin signals end of input
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let status = child
                .wait()
                .with_context(|| format!("waiting for ffmpeg writing {}", self.path.display()))?;
            if !status.success() {
                return Err(anyhow!(
                    "ffmpeg exited with {} while writing {}",
                    status,
                    self.path.display()
                ));
            }
        }
        Ok(())
    }
}

impl VideoWriter for FfmpegVideoWriter {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(anyhow!(
                "frame is {}x{}, video {} is {}x{}",
                frame.width(),
                frame.height(),
                self.path.display(),
                self.width,
                self.height
            ));
        }
        if let Some(status) = self.encoder_exit() {
            return Err(anyhow!(
                "ffmpeg exited with {} while writing {}",
                status,
                self.path.display()
            ));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| anyhow!("video {} already closed", self.path.display()))?;
        stdin
            .write_all(frame.pixels())
            .with_context(|| format!("writing frame to {}", self.path.display()))?;
        self.frames += 1;
        Ok(())
    }

    fn is_open(&mut self) -> bool {
        self.stdin.is_some() && self.encoder_exit().is_none()
    }

    fn finish(mut self: Box<Self>) -> Result<u64> {
        self.close()?;
        Ok(self.frames)
    }
}

impl Drop for FfmpegVideoWriter {
    fn drop(&mut self) {
        if self.child.is_some() {
            if let Err(err) = self.close() {
                log::warn!("closing video on drop: {:#}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_fails_for_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let result = FfmpegVideoWriter::spawn(
            Path::new("/nonexistent/ffmpeg"),
            &dir.path().join("out.mp4"),
            16,
            16,
            20,
        );
        assert!(result.is_err());
    }

    #[test]
    fn spawn_rejects_empty_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            FfmpegVideoWriter::spawn(Path::new("ffmpeg"), &dir.path().join("out.mp4"), 0, 16, 20);
        assert!(result.is_err());
    }

    /// Writes an executable stand-in for ffmpeg into `dir`.
    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn pipes_raw_rgb_frames_with_source_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let args_file = dir.path().join("args.txt");
        let ffmpeg = fake_ffmpeg(
            dir.path(),
            &format!(
                "printf '%s\\n' \"$@\" > '{}'\nfor last; do :; done\ncat > \"$last\"",
                args_file.display()
            ),
        );
        let out = dir.path().join("video_cat_1.mp4");

        let mut writer = FfmpegVideoWriter::spawn(&ffmpeg, &out, 7, 5, 20).unwrap();
        assert!(writer.is_open());
        for shade in [10u8, 20, 30] {
            writer.write_frame(&Frame::filled(7, 5, [shade, 0, 0])).unwrap();
        }
        let written = Box::new(writer).finish().unwrap();
        assert_eq!(written, 3);

        let args: Vec<String> = std::fs::read_to_string(&args_file)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        let after = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };
        assert_eq!(after("-s").as_deref(), Some("7x5"));
        assert_eq!(after("-r").as_deref(), Some("20"));
        assert_eq!(after("-pix_fmt").as_deref(), Some("rgb24"));
        assert_eq!(after("-c:v").as_deref(), Some("mpeg4"));
        assert_eq!(args.last().map(PathBuf::from), Some(out.clone()));

        let bytes = std::fs::metadata(&out).unwrap().len();
        assert_eq!(bytes, 7 * 5 * 3 * 3);
    }

    #[cfg(unix)]
    #[test]
    fn rejects_frames_of_another_size() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), "cat > /dev/null");
        let mut writer =
            FfmpegVideoWriter::spawn(&ffmpeg, &dir.path().join("out.mp4"), 7, 5, 20).unwrap();
        assert!(writer.write_frame(&Frame::filled(8, 5, [0, 0, 0])).is_err());
        writer.write_frame(&Frame::filled(7, 5, [0, 0, 0])).unwrap();
        assert_eq!(Box::new(writer).finish().unwrap(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn dead_encoder_closes_writer_and_fails_finish() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), "exit 1");
        let mut writer =
            FfmpegVideoWriter::spawn(&ffmpeg, &dir.path().join("out.mp4"), 7, 5, 20).unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while writer.is_open() && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(!writer.is_open());
        assert!(writer.write_frame(&Frame::filled(7, 5, [0, 0, 0])).is_err());
        let err = Box::new(writer).finish().unwrap_err();
        assert!(format!("{:#}", err).contains("exited"));
    }
}
