#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::detect::yolo::{decode_predictions, YoloParams};
use crate::frame::Frame;

/// Tract-based backend for YOLO-style ONNX pothole models.
///
/// This backend loads a local model file and performs inference on RGB frames.
/// Frames are resized to the model's square input; boxes are mapped back to
/// frame pixels after decoding.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    params: YoloParams,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        if input_size == 0 {
            return Err(anyhow!("model input size must be greater than zero"));
        }
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(0, f32::fact([1, 3, side, side]).into())
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            params: YoloParams::default(),
        })
    }

    /// Override the default decoding parameters.
    pub fn with_params(mut self, params: YoloParams) -> Self {
        self.params = params;
        self
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let side = self.input_size;
        let resized = imageops::resize(&frame.image, side, side, FilterType::Triangle);
        let side = side as usize;
        tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, channel, y, x)| {
            resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0
        })
        .into_tensor()
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }
        let input = self.build_input(frame);
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
        let (channels, anchors) = match shape.as_slice() {
            [1, channels, anchors] => (*channels, *anchors),
            [channels, anchors] => (*channels, *anchors),
            other => return Err(anyhow!("unexpected model output shape {:?}", other)),
        };
        let data: Vec<f32> = view.iter().copied().collect();

        let scale_x = frame.width() as f32 / self.input_size as f32;
        let scale_y = frame.height() as f32 / self.input_size as f32;
        Ok(decode_predictions(
            &data,
            channels,
            anchors,
            scale_x,
            scale_y,
            &self.params,
        ))
    }

    fn warm_up(&mut self) -> Result<()> {
        let side = self.input_size as usize;
        let zeros = Tensor::zero::<f32>(&[1, 3, side, side])?;
        self.model
            .run(tvec!(zeros.into()))
            .context("ONNX warm-up failed")?;
        Ok(())
    }
}
