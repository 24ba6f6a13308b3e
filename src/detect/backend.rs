use anyhow::Result;

use crate::detect::result::Inference;
use crate::frame::Frame;

/// Detector backend trait.
///
/// A backend is a black box from frame to labelled boxes. It returns an
/// annotated copy of the frame alongside the detections; the input frame is
/// never modified.
pub trait Detector {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Labels this backend can report.
    fn labels(&self) -> Vec<String>;

    /// Run inference on a frame.
    fn infer(&mut self, frame: &Frame) -> Result<Inference>;

    /// Report (and draw) only detections at or above `min` from now on.
    fn set_min_confidence(&mut self, min: f32);

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn labels(&self) -> Vec<String> {
        (**self).labels()
    }

    fn infer(&mut self, frame: &Frame) -> Result<Inference> {
        (**self).infer(frame)
    }

    fn set_min_confidence(&mut self, min: f32) {
        (**self).set_min_confidence(min)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
