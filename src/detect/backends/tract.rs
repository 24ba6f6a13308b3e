#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::detect::annotate::Annotator;
use crate::detect::backend::Detector;
use crate::detect::labels::COCO_LABELS;
use crate::detect::result::{BoundingBox, Detection, DetectionEvent, Inference};
use crate::frame::Frame;

const DEFAULT_SCORE_FLOOR: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const MAX_DETECTIONS: usize = 300;

/// Tract-based backend for YOLOv8 ONNX models.
///
/// The model is expected to take a `1x3xSxS` float input in 0..1 and emit a
/// `1x(4+C)xN` tensor of centre-format boxes followed by per-class scores.
/// It performs no network I/O and writes nothing to disk.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
    score_floor: f32,
    iou_threshold: f32,
    annotator: Annotator,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        if input_size == 0 {
            return Err(anyhow!("model input size must be > 0"));
        }
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            score_floor: DEFAULT_SCORE_FLOOR,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            annotator: Annotator::boxes_only(),
        })
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let side = self.input_size;
        let resized = imageops::resize(frame.image(), side, side, FilterType::Triangle);
        let side = side as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            resized.get_pixel(x as u32, y as u32).0[c] as f32 / 255.0
        });
        input.into_tensor()
    }

    fn decode(&self, outputs: TVec<TValue>) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output is not rank 3")?;
        let (_, rows, anchors) = view.dim();
        if rows <= 4 {
            return Err(anyhow!("model output has {} rows, expected > 4", rows));
        }
        let classes = rows - 4;
        let side = self.input_size as f32;

        let mut candidates = Vec::new();
        for i in 0..anchors {
            let (class, score) = (0..classes)
                .map(|c| (c, view[[0, 4 + c, i]]))
                .fold((0, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                });
            if !score.is_finite() || score < self.score_floor {
                continue;
            }
            let (cx, cy, w, h) = (
                view[[0, 0, i]],
                view[[0, 1, i]],
                view[[0, 2, i]],
                view[[0, 3, i]],
            );
            let bbox = BoundingBox::new(
                (cx - w / 2.0) / side,
                (cy - h / 2.0) / side,
                w / side,
                h / side,
            );
            candidates.push((class, Detection::new(class_label(class), score, bbox)));
        }

        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

impl Detector for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn labels(&self) -> Vec<String> {
        COCO_LABELS.iter().map(|l| l.to_string()).collect()
    }

    fn infer(&mut self, frame: &Frame) -> Result<Inference> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let event = DetectionEvent::new(self.decode(outputs)?);
        Ok(Inference {
            annotated: self.annotator.annotate(frame, &event),
            event,
        })
    }

    fn set_min_confidence(&mut self, min: f32) {
        self.score_floor = min;
    }
}

fn class_label(class: usize) -> String {
    COCO_LABELS
        .get(class)
        .map(|l| l.to_string())
        .unwrap_or_else(|| format!("class_{}", class))
}

/// Greedy per-class suppression, highest score first.
fn non_max_suppression(mut candidates: Vec<(usize, Detection)>, iou: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.1.confidence.total_cmp(&a.1.confidence));
    let mut kept: Vec<(usize, Detection)> = Vec::new();
    for (class, det) in candidates {
        let overlaps = kept
            .iter()
            .any(|(k_class, k)| *k_class == class && k.bbox.iou(&det.bbox) > iou);
        if !overlaps {
            kept.push((class, det));
            if kept.len() >= MAX_DETECTIONS {
                break;
            }
        }
    }
    kept.into_iter().map(|(_, det)| det).collect()
}
