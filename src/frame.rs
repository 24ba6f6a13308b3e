//! Frame container shared by sources, detectors, sinks and displays.
//!
//! - `Frame`: an owned RGB8 image with a per-source sequence index.
//!
//! Frames are produced fresh by a `FrameSource` on every iteration. Detectors
//! return an annotated copy; the capture controller writes whichever frame it
//! is handed to the storage sink.

use anyhow::{anyhow, Context, Result};
use image::{ImageBuffer, Rgb, RgbImage};
use std::path::Path;

/// Bytes per pixel for the RGB8 layout used by every frame.
pub const RGB_CHANNELS: usize = 3;

/// Owned RGB frame.
#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
    /// Sequence number assigned by the source (0 for stand-alone images).
    pub index: u64,
}

impl Frame {
    /// Wrap packed RGB8 bytes. Fails when the length does not match the dimensions.
    pub fn from_rgb(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(RGB_CHANNELS))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        let image = ImageBuffer::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("RGB buffer does not fit {}x{}", width, height))?;
        Ok(Self { image, index: 0 })
    }

    /// Solid-colour frame.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self {
            image: ImageBuffer::from_pixel(width, height, Rgb(rgb)),
            index: 0,
        }
    }

    pub fn from_image(image: RgbImage) -> Self {
        Self { image, index: 0 }
    }

    /// Decode an image file from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("failed to open image {}", path.display()))?
            .to_rgb8();
        Ok(Self::from_image(image))
    }

    pub fn with_index(mut self, index: u64) -> Self {
        self.index = index;
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Packed RGB8 bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgb_rejects_length_mismatch() {
        assert!(Frame::from_rgb(vec![0u8; 10], 4, 4).is_err());
        let frame = Frame::from_rgb(vec![0u8; 4 * 4 * 3], 4, 4).unwrap();
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 4);
        assert_eq!(frame.pixels().len(), 48);
    }

    #[test]
    fn filled_frame_uses_requested_colour() {
        let frame = Frame::filled(2, 3, [10, 20, 30]).with_index(7);
        assert_eq!(frame.index, 7);
        assert_eq!(&frame.pixels()[..3], &[10, 20, 30]);
        assert_eq!(frame.pixels().len(), 2 * 3 * 3);
    }
}
