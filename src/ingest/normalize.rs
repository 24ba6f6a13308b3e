use anyhow::{anyhow, Context, Result};

use crate::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Yuyv,
    Mjpeg,
}

impl PixelFormat {
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(Self::Rgb24),
            b"YUYV" => Some(Self::Yuyv),
            b"MJPG" => Some(Self::Mjpeg),
            _ => None,
        }
    }
}

pub(crate) fn normalize_to_frame(
    buf: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Frame> {
    match format {
        PixelFormat::Rgb24 => {
            let expected = (width as usize) * (height as usize) * 3;
            let data = buf
                .get(..expected)
                .ok_or_else(|| anyhow!("RGB frame too short: {} < {}", buf.len(), expected))?;
            Frame::from_rgb(data.to_vec(), width, height)
        }
        PixelFormat::Yuyv => Frame::from_rgb(yuyv_to_rgb(buf, width, height)?, width, height),
        PixelFormat::Mjpeg => {
            let image = image::load_from_memory(buf).context("decode mjpeg frame")?;
            Ok(Frame::from_image(image.to_rgb8()))
        }
    }
}

fn yuyv_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let w = width as usize;
    let h = height as usize;
    let expected = w
        .checked_mul(h)
        .and_then(|v| v.checked_mul(2))
        .ok_or_else(|| anyhow!("YUYV frame dimensions overflow"))?;
    if pixels.len() < expected {
        return Err(anyhow!(
            "YUYV frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut rgb = Vec::with_capacity(w * h * 3);
    for chunk in pixels[..expected].chunks_exact(4) {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;
        for &y in [chunk[0], chunk[2]].iter() {
            let y = y as f32;
            let r = y + 1.402_f32 * v;
            let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
            let b = y + 1.772_f32 * u;
            rgb.push(r.clamp(0.0, 255.0) as u8);
            rgb.push(g.clamp(0.0, 255.0) as u8);
            rgb.push(b.clamp(0.0, 255.0) as u8);
        }
    }
    Ok(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_grey_maps_to_grey() -> Result<()> {
        let buf = [128u8, 128, 128, 128, 128, 128, 128, 128];
        let frame = normalize_to_frame(&buf, 2, 2, PixelFormat::Yuyv)?;
        assert!(frame.pixels().iter().all(|&p| p == 128));
        Ok(())
    }

    #[test]
    fn rgb_requires_full_frame() {
        assert!(normalize_to_frame(&[0u8; 5], 2, 2, PixelFormat::Rgb24).is_err());
    }
}
