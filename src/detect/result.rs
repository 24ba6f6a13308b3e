use crate::frame::Frame;

/// Axis-aligned box in normalized 0..1 frame coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> f32 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.w).min(other.x + other.w);
        let bottom = (self.y + self.h).min(other.y + other.h);
        let inter = (right - left).max(0.0) * (bottom - top).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Pixel rectangle `(x, y, w, h)` clamped to the frame, at least 1x1.
    pub fn to_pixels(&self, width: u32, height: u32) -> (i32, i32, u32, u32) {
        let clamp = |v: f32| v.clamp(0.0, 1.0);
        let x0 = (clamp(self.x) * width as f32) as u32;
        let y0 = (clamp(self.y) * height as f32) as u32;
        let x1 = (clamp(self.x + self.w) * width as f32) as u32;
        let y1 = (clamp(self.y + self.h) * height as f32) as u32;
        let x0 = x0.min(width.saturating_sub(1));
        let y0 = y0.min(height.saturating_sub(1));
        let w = x1.saturating_sub(x0).max(1);
        let h = y1.saturating_sub(y0).max(1);
        (x0 as i32, y0 as i32, w, h)
    }
}

/// One detected instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub label: String,
    /// 0.0..=1.0
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }
}

/// Detector output for a single frame. Produced fresh per frame, never retained.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionEvent {
    pub detections: Vec<Detection>,
}

impl DetectionEvent {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter()
    }
}

/// Annotated frame plus the detections drawn onto it.
#[derive(Clone, Debug)]
pub struct Inference {
    pub annotated: Frame,
    pub event: DetectionEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = BoundingBox::new(0.1, 0.1, 0.2, 0.2);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        let b = BoundingBox::new(0.5, 0.5, 0.1, 0.1);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn to_pixels_clamps_to_frame() {
        let b = BoundingBox::new(-0.5, 0.9, 2.0, 0.5);
        let (x, y, w, h) = b.to_pixels(100, 50);
        assert_eq!((x, y), (0, 45));
        assert_eq!(w, 100);
        assert_eq!(h, 5);
    }
}
