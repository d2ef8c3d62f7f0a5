#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

const CXYWH_OFFSET: usize = 4;

/// Tract-based backend for YOLOv8 ONNX detection models.
///
/// Loads a local model file once. Each frame is stretched to the model input,
/// the `[1, 4 + classes, anchors]` output is decoded into boxes, filtered by
/// confidence and suppressed per class by IoU, then scaled back to frame
/// coordinates. No network I/O, nothing written to disk.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl TractBackend {
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
        })
    }

    pub fn with_thresholds(mut self, confidence: f32, iou: f32) -> Self {
        self.confidence_threshold = confidence;
        self.iou_threshold = iou;
        self
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let resized = imageops::resize(frame.image(), self.width, self.height, FilterType::Triangle);
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        input.into_tensor()
    }

    fn decode(&self, output: &Tensor, frame_w: f32, frame_h: f32) -> Result<Vec<RawDetection>> {
        let preds = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = preds.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 || shape[1] <= CXYWH_OFFSET {
            return Err(anyhow!("unexpected YOLO output shape {:?}", shape));
        }
        let classes = shape[1] - CXYWH_OFFSET;
        let anchors = shape[2];
        let sx = frame_w / self.width as f32;
        let sy = frame_h / self.height as f32;

        let mut candidates = Vec::new();
        for a in 0..anchors {
            let (class_id, confidence) = (0..classes)
                .map(|c| (c, preds[[0, CXYWH_OFFSET + c, a]]))
                .fold((0, f32::NEG_INFINITY), |best, x| if x.1 > best.1 { x } else { best });
            if confidence < self.confidence_threshold {
                continue;
            }
            let cx = preds[[0, 0, a]] * sx;
            let cy = preds[[0, 1, a]] * sy;
            let w = preds[[0, 2, a]] * sx;
            let h = preds[[0, 3, a]] * sy;
            candidates.push(RawDetection::new(
                (cx - w / 2.0).clamp(0.0, frame_w),
                (cy - h / 2.0).clamp(0.0, frame_h),
                (cx + w / 2.0).clamp(0.0, frame_w),
                (cy + h / 2.0).clamp(0.0, frame_h),
                class_id,
                confidence,
            ));
        }
        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        self.decode(output, frame.width() as f32, frame.height() as f32)
    }
}

fn iou(a: &RawDetection, b: &RawDetection) -> f32 {
    let l = a.x1.max(b.x1);
    let r = a.x2.min(b.x2);
    let t = a.y1.max(b.y1);
    let btm = a.y2.min(b.y2);
    let inter = (r - l).max(0.0) * (btm - t).max(0.0);
    let area = |d: &RawDetection| (d.x2 - d.x1) * (d.y2 - d.y1);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Greedy per-class suppression, highest confidence first.
fn non_max_suppression(mut xs: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    xs.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<RawDetection> = Vec::with_capacity(xs.len());
    for det in xs {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == det.class_id && iou(k, &det) > iou_threshold);
        if !suppressed {
            kept.push(det);
        }
    }
    kept
}
