#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::labels::COCO_LABELS;
use crate::detect::result::Detection;
use crate::detect::yolo::{self, YoloParams};

/// Tract-based backend for YOLOv8-style ONNX object detectors.
///
/// Loads a local model file and runs it on RGB24 frames. Frames are resized
/// (nearest neighbour, no letterbox) to the model input, and decoded boxes
/// are scaled back to frame pixels.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    params: YoloParams,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, params: YoloParams) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(
                        1,
                        3,
                        params.input_height as usize,
                        params.input_width as usize
                    ),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self { model, params })
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;

        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let src_w = width as usize;
        let src_h = height as usize;
        let dst_w = self.params.input_width as usize;
        let dst_h = self.params.input_height as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, dst_h, dst_w),
            |(_, channel, y, x)| {
                let sx = (x * src_w / dst_w).min(src_w - 1);
                let sy = (y * src_h / dst_h).min(src_h - 1);
                let idx = (sy * src_w + sx) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        if width == 0 || height == 0 {
            return Err(anyhow!("empty frame {}x{}", width, height));
        }
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[1] < 5 {
            return Err(anyhow!("unexpected detector output shape {:?}", shape));
        }
        let num_classes = shape[1] - 4;
        if num_classes != COCO_LABELS.len() {
            log::debug!(
                "detector reports {} classes, labels beyond COCO-80 read as \"object\"",
                num_classes
            );
        }
        let flat: Vec<f32> = view.iter().copied().collect();
        yolo::decode(&flat, num_classes, &self.params, width, height)
    }

    fn warm_up(&mut self) -> Result<()> {
        let w = self.params.input_width;
        let h = self.params.input_height;
        let blank = vec![0u8; (w * h * 3) as usize];
        self.detect(&blank, w, h).map(|_| ())
    }
}
