use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::Rgb;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::detect::result::{Detection, DetectionEvent};
use crate::frame::Frame;

const PALETTE: [[u8; 3]; 6] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [72, 249, 10],
    [0, 194, 255],
    [52, 69, 147],
];

/// Box outline thickness in pixels.
const THICKNESS: i32 = 2;

const CAPTION_SCALE: f32 = 14.0;
const CAPTION_TEXT: Rgb<u8> = Rgb([255, 255, 255]);

/// Draws detections onto frames.
///
/// Without a font only the boxes are drawn. With one, each box also gets a
/// `<label> <confidence>` caption on a tab in the box colour.
#[derive(Default)]
pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    pub fn boxes_only() -> Self {
        Self::default()
    }

    /// Load a TrueType/OpenType font for captions.
    pub fn with_font_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        Self::with_font_bytes(bytes)
            .with_context(|| format!("failed to load font {}", path.display()))
    }

    pub fn with_font_bytes(bytes: Vec<u8>) -> Result<Self> {
        let font = FontVec::try_from_vec(bytes).map_err(|e| anyhow!("invalid font: {}", e))?;
        Ok(Self { font: Some(font) })
    }

    pub fn draws_captions(&self) -> bool {
        self.font.is_some()
    }

    /// Draw every detection onto a copy of `frame`.
    pub fn annotate(&self, frame: &Frame, event: &DetectionEvent) -> Frame {
        let mut annotated = frame.clone();
        let (width, height) = (frame.width(), frame.height());
        if width == 0 || height == 0 {
            return annotated;
        }
        for detection in event.iter() {
            let colour = Rgb(label_colour(&detection.label));
            let (x, y, w, h) = detection.bbox.to_pixels(width, height);
            for inset in 0..THICKNESS {
                let w = w.saturating_sub(2 * inset as u32);
                let h = h.saturating_sub(2 * inset as u32);
                if w == 0 || h == 0 {
                    break;
                }
                let rect = Rect::at(x + inset, y + inset).of_size(w, h);
                draw_hollow_rect_mut(annotated.image_mut(), rect, colour);
            }
            if let Some(font) = &self.font {
                let text = caption(detection);
                let scale = PxScale::from(CAPTION_SCALE);
                let (text_w, text_h) = text_size(scale, font, &text);
                let tab_h = text_h as i32 + 2;
                // above the box when there is room, inside it otherwise
                let tab_y = if y >= tab_h { y - tab_h } else { y };
                let tab = Rect::at(x, tab_y).of_size(text_w + 4, text_h + 2);
                draw_filled_rect_mut(annotated.image_mut(), tab, colour);
                draw_text_mut(
                    annotated.image_mut(),
                    CAPTION_TEXT,
                    x + 2,
                    tab_y + 1,
                    scale,
                    font,
                    &text,
                );
            }
        }
        annotated
    }
}

/// Caption drawn next to a box, e.g. `person 0.91`.
pub fn caption(detection: &Detection) -> String {
    format!("{} {:.2}", detection.label, detection.confidence)
}

/// Stable colour per label.
fn label_colour(label: &str) -> [u8; 3] {
    let sum = label
        .to_lowercase()
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    PALETTE[sum % PALETTE.len()]
}
