//! Object detection seam.
//!
//! The detector is a black box: frame in, annotated frame plus labelled boxes
//! out. Backends:
//! - `stub`: finds the marker object painted by `stub://` sources
//! - `tract`: YOLOv8 ONNX inference (feature: backend-tract)

pub mod annotate;
mod backend;
mod backends;
pub mod labels;
mod result;

use anyhow::{anyhow, Result};

pub use backend::Detector;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{BoundingBox, Detection, DetectionEvent, Inference};

use crate::config::DetectorSettings;
use annotate::Annotator;

/// Build the backend named in the settings.
pub fn build_detector(settings: &DetectorSettings) -> Result<Box<dyn Detector>> {
    let annotator = match &settings.font_path {
        Some(path) => Annotator::with_font_file(path)?,
        None => Annotator::boxes_only(),
    };
    let mut detector: Box<dyn Detector> = match settings.backend.as_str() {
        "stub" => Box::new(
            StubBackend::new(settings.stub_label.clone()).with_annotator(annotator),
        ),
        "tract" => {
            #[cfg(feature = "backend-tract")]
            {
                Box::new(
                    TractBackend::new(&settings.model_path, settings.input_size)?
                        .with_annotator(annotator),
                )
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                return Err(anyhow!(
                    "the tract backend requires the backend-tract feature"
                ));
            }
        }
        other => return Err(anyhow!("unknown detector backend '{}'", other)),
    };
    detector.warm_up()?;
    log::info!("detector backend '{}' ready", detector.name());
    Ok(detector)
}
