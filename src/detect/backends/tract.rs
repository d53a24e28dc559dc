#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::classes::CLASS_LABELS;
use crate::detect::result::{NormalizedBox, RawCandidate};

/// Tract-based backend for ONNX inference.
///
/// Loads a local YOLO-style model and performs inference on RGB frames.
/// The model output is expected to be rows of
/// `[cx, cy, w, h, objectness, class scores...]` with coordinates
/// normalized to the model input. No network I/O happens here.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_width: u32,
    input_height: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_width: u32, input_height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_height as usize, input_width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_width,
            input_height,
        })
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        if width != self.input_width || height != self.input_height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                width,
                height,
                self.input_width,
                self.input_height
            ));
        }

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

        let width = width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, height as usize, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }

    fn parse_rows(&self, outputs: TVec<TValue>) -> Result<Vec<RawCandidate>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let flat: Vec<f32> = view.iter().cloned().collect();

        let row_len = 5 + CLASS_LABELS.len();
        if flat.len() % row_len != 0 {
            return Err(anyhow!(
                "model output length {} is not a multiple of row length {}",
                flat.len(),
                row_len
            ));
        }

        let mut candidates = Vec::new();
        for row in flat.chunks_exact(row_len) {
            let objectness = row[4];
            if objectness <= 0.0 {
                continue;
            }
            let scores = row[5..].iter().map(|s| s * objectness).collect();
            candidates.push(RawCandidate {
                bbox: NormalizedBox {
                    cx: row[0],
                    cy: row[1],
                    w: row[2],
                    h: row[3],
                },
                scores,
            });
        }
        Ok(candidates)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<RawCandidate>> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.parse_rows(outputs)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = vec![0u8; (self.input_width * self.input_height * 3) as usize];
        self.detect(&blank, self.input_width, self.input_height)
            .map(|_| ())
    }
}
