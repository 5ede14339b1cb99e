#![cfg(feature = "backend-tract")]

//! ONNX inference backends via tract.
//!
//! Two models back the pipeline in production:
//! - a full-frame object detector exported with `boxes`, `labels`, `scores`
//!   outputs (torchvision detection export layout),
//! - a small per-window face classifier driven by `CascadeDetector`.
//!
//! Both are loaded once from local model files and never retrained. No
//! network I/O happens here.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::ObjectDetector;
use crate::detect::cascade::WindowClassifier;
use crate::detect::result::Detection;

fn load_model<P: AsRef<Path>>(
    model_path: P,
    input_shape: [usize; 4],
) -> Result<SimplePlan<TypedFact, Box<dyn TypedOp>>> {
    let model_path = model_path.as_ref();
    tract_onnx::onnx()
        .model_for_path(model_path)
        .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
        .with_input_fact(
            0,
            InferenceFact::dt_shape(
                f32::datum_type(),
                tvec!(
                    input_shape[0],
                    input_shape[1],
                    input_shape[2],
                    input_shape[3]
                ),
            ),
        )
        .context("failed to set input fact")?
        .into_optimized()
        .context("failed to optimize ONNX model")?
        .into_runnable()
        .context("failed to build runnable ONNX model")
}

/// Full-frame object detector backed by an ONNX model.
///
/// The model input is NCHW f32 in [0, 1]; frames must match the input
/// size the model was exported with.
pub struct TractObjectDetector {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    width: u32,
    height: u32,
}

impl TractObjectDetector {
    /// Load an ONNX detection model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model = load_model(model_path, [1, 3, height as usize, width as usize])?;
        Ok(Self {
            model,
            width,
            height,
        })
    }

    fn build_input(&self, rgb: &[u8], width: u32, height: u32) -> Result<Tensor> {
        if width != self.width || height != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                width,
                height,
                self.width,
                self.height
            ));
        }

        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if rgb.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                rgb.len()
            ));
        }

        let width = width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, height as usize, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                rgb[idx] as f32 / 255.0
            },
        );
        Ok(input.into_tensor())
    }
}

fn extract_detections(outputs: &[impl std::ops::Deref<Target = Tensor>]) -> Result<Vec<Detection>> {
    let boxes_tensor = outputs
        .first()
        .ok_or_else(|| anyhow!("model produced no box output"))?;
    let labels_tensor = outputs
        .get(1)
        .ok_or_else(|| anyhow!("model produced no label output"))?;
    let scores_tensor = outputs
        .get(2)
        .ok_or_else(|| anyhow!("model produced no score output"))?;

    let boxes_view = boxes_tensor
        .to_array_view::<f32>()
        .context("box tensor was not f32")?;
    let labels_view = labels_tensor
        .to_array_view::<i64>()
        .context("label tensor was not i64")?;
    let scores_view = scores_tensor
        .to_array_view::<f32>()
        .context("score tensor was not f32")?;

    let boxes = boxes_view
        .as_slice()
        .ok_or_else(|| anyhow!("box tensor was not contiguous"))?;
    if boxes.len() != labels_view.len() * 4 {
        return Err(anyhow!(
            "box tensor length {} does not match {} labels",
            boxes.len(),
            labels_view.len()
        ));
    }
    if scores_view.len() != labels_view.len() {
        return Err(anyhow!(
            "score tensor length {} does not match {} labels",
            scores_view.len(),
            labels_view.len()
        ));
    }

    let mut detections = Vec::with_capacity(labels_view.len());
    for ((corners, &label), &score) in boxes
        .chunks_exact(4)
        .zip(labels_view.iter())
        .zip(scores_view.iter())
    {
        if label < 0 {
            return Err(anyhow!("model reported negative label {}", label));
        }
        detections.push(Detection {
            x1: corners[0],
            y1: corners[1],
            x2: corners[2],
            y2: corners[3],
            class_index: label as usize,
            score,
        });
    }
    Ok(detections)
}

impl ObjectDetector for TractObjectDetector {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        let input = self.build_input(rgb, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        extract_detections(&outputs)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = vec![0u8; (self.width * self.height * 3) as usize];
        self.detect(&blank, self.width, self.height).map(|_| ())
    }
}

/// Per-window face classifier backed by an ONNX model.
///
/// Input is one greyscale window (N1HW f32 in [0, 1]); the score is the
/// maximum finite output value clamped to [0, 1].
pub struct TractWindowClassifier {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    window: u32,
}

impl TractWindowClassifier {
    pub fn new<P: AsRef<Path>>(model_path: P, window: u32) -> Result<Self> {
        let model = load_model(model_path, [1, 1, window as usize, window as usize])?;
        Ok(Self { model, window })
    }
}

impl WindowClassifier for TractWindowClassifier {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn window_size(&self) -> u32 {
        self.window
    }

    fn score(&mut self, window: &[u8]) -> Result<f32> {
        let side = self.window as usize;
        if window.len() != side * side {
            return Err(anyhow!(
                "expected {} window bytes, received {}",
                side * side,
                window.len()
            ));
        }

        let input = tract_ndarray::Array4::from_shape_fn((1, 1, side, side), |(_, _, y, x)| {
            window[y * side + x] as f32 / 255.0
        });
        let outputs = self
            .model
            .run(tvec!(input.into_tensor().into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;

        let max_score = output.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        if max_score.is_finite() {
            Ok(max_score.clamp(0.0, 1.0))
        } else {
            Ok(0.0)
        }
    }
}
