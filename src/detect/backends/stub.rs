use anyhow::Result;

use crate::detect::annotate::Annotator;
use crate::detect::backend::Detector;
use crate::detect::result::{BoundingBox, Detection, DetectionEvent, Inference};
use crate::frame::Frame;
use crate::ingest::synthetic::MARKER_RGB;

/// Confidence reported for every marker hit.
pub const STUB_CONFIDENCE: f32 = 0.9;

/// Stub backend for testing and `stub://` sources.
///
/// Reports the synthetic scene's marker object (pixels of exactly `MARKER_RGB`)
/// as a single detection carrying the configured label.
pub struct StubBackend {
    label: String,
    min_confidence: f32,
    annotator: Annotator,
}

impl StubBackend {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            min_confidence: 0.0,
            annotator: Annotator::boxes_only(),
        }
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    fn locate_marker(&self, frame: &Frame) -> Option<BoundingBox> {
        let (width, height) = (frame.width(), frame.height());
        let mut min_x = u32::MAX;
        let mut min_y = u32::MAX;
        let mut max_x = 0u32;
        let mut max_y = 0u32;
        let mut found = false;
        for (x, y, pixel) in frame.image().enumerate_pixels() {
            if pixel.0 == MARKER_RGB {
                found = true;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
        if !found {
            return None;
        }
        Some(BoundingBox::new(
            min_x as f32 / width as f32,
            min_y as f32 / height as f32,
            (max_x - min_x + 1) as f32 / width as f32,
            (max_y - min_y + 1) as f32 / height as f32,
        ))
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new("person")
    }
}

impl Detector for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn labels(&self) -> Vec<String> {
        vec![self.label.clone()]
    }

    fn infer(&mut self, frame: &Frame) -> Result<Inference> {
        let detections = self
            .locate_marker(frame)
            .filter(|_| STUB_CONFIDENCE >= self.min_confidence)
            .map(|bbox| vec![Detection::new(self.label.clone(), STUB_CONFIDENCE, bbox)])
            .unwrap_or_default();
        let event = DetectionEvent::new(detections);
        Ok(Inference {
            annotated: self.annotator.annotate(frame, &event),
            event,
        })
    }

    fn set_min_confidence(&mut self, min: f32) {
        self.min_confidence = min;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn stub_backend_reports_marker() {
        let mut backend = StubBackend::new("cat");

        let empty = Frame::filled(40, 20, [10, 10, 10]);
        let r1 = backend.infer(&empty).unwrap();
        assert!(r1.event.is_empty());

        let mut frame = Frame::filled(40, 20, [10, 10, 10]);
        for x in 10..20 {
            for y in 5..10 {
                frame.image_mut().put_pixel(x, y, Rgb(MARKER_RGB));
            }
        }
        let r2 = backend.infer(&frame).unwrap();
        assert_eq!(r2.event.len(), 1);
        let hit = &r2.event.detections[0];
        assert_eq!(hit.label, "cat");
        assert_eq!(hit.confidence, STUB_CONFIDENCE);
        assert!((hit.bbox.x - 0.25).abs() < 1e-6);
        assert!((hit.bbox.w - 0.25).abs() < 1e-6);
        assert!((hit.bbox.h - 0.25).abs() < 1e-6);

        backend.set_min_confidence(0.95);
        assert!(backend.infer(&frame).unwrap().event.is_empty());
        backend.set_min_confidence(0.8);
        assert_eq!(backend.infer(&frame).unwrap().event.len(), 1);
    }
}
