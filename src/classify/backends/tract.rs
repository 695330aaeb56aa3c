#![cfg(feature = "backend-tract")]

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::classify::backend::Classifier;
use crate::classify::labels::load_labels;
use crate::classify::result::LabelScores;
use crate::config::TensorLayout;
use crate::orientation::Size;
use crate::preprocess::PreparedImage;

/// Tract-based backend for ONNX image classifiers.
///
/// The model file and label list are read from local disk in `initialize`.
/// The first model output must hold one score per label.
pub struct TractClassifier {
    model_path: PathBuf,
    labels_path: PathBuf,
    input: Size,
    layout: TensorLayout,
    loaded: Option<LoadedModel>,
}

struct LoadedModel {
    plan: TypedRunnableModel<TypedModel>,
    labels: Vec<String>,
}

impl TractClassifier {
    pub fn new(
        model_path: impl Into<PathBuf>,
        labels_path: impl Into<PathBuf>,
        input: Size,
        layout: TensorLayout,
    ) -> Self {
        Self {
            model_path: model_path.into(),
            labels_path: labels_path.into(),
            input,
            layout,
            loaded: None,
        }
    }

    fn input_shape(&self) -> TVec<usize> {
        let (w, h) = (self.input.width as usize, self.input.height as usize);
        match self.layout {
            TensorLayout::Nhwc => tvec!(1, h, w, 3),
            TensorLayout::Nchw => tvec!(1, 3, h, w),
        }
    }

    fn build_input(&self, image: &PreparedImage) -> Result<Tensor> {
        if image.width != self.input.width || image.height != self.input.height {
            return Err(anyhow!(
                "image size {}x{} does not match model input {}x{}",
                image.width,
                image.height,
                self.input.width,
                self.input.height
            ));
        }
        let expected_len = image.width as usize * image.height as usize * 3;
        if image.data.len() != expected_len {
            return Err(anyhow!(
                "expected {} tensor values, received {}",
                expected_len,
                image.data.len()
            ));
        }

        let width = image.width as usize;
        let height = image.height as usize;
        let data = &image.data;
        let input = match self.layout {
            TensorLayout::Nhwc => tract_ndarray::Array4::from_shape_fn(
                (1, height, width, 3),
                |(_, y, x, channel)| data[(y * width + x) * 3 + channel],
            ),
            TensorLayout::Nchw => tract_ndarray::Array4::from_shape_fn(
                (1, 3, height, width),
                |(_, channel, y, x)| data[(y * width + x) * 3 + channel],
            ),
        };
        Ok(input.into_tensor())
    }
}

impl Classifier for TractClassifier {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn initialize(&mut self) -> Result<()> {
        let plan = tract_onnx::onnx()
            .model_for_path(&self.model_path)
            .with_context(|| {
                format!(
                    "failed to load ONNX model from {}",
                    self.model_path.display()
                )
            })?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), self.input_shape()),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;
        let labels = load_labels(&self.labels_path)?;

        log::info!(
            "TractClassifier: loaded {} ({} labels, input {}x{} {:?})",
            self.model_path.display(),
            labels.len(),
            self.input.width,
            self.input.height,
            self.layout
        );
        self.loaded = Some(LoadedModel { plan, labels });
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.loaded.is_some()
    }

    fn input_size(&self) -> Option<Size> {
        self.loaded.as_ref().map(|_| self.input)
    }

    fn classify(&mut self, image: &PreparedImage) -> Result<LabelScores> {
        let input = self.build_input(image)?;
        let loaded = self
            .loaded
            .as_ref()
            .ok_or_else(|| anyhow!("tract classifier is not initialized"))?;
        let outputs = loaded
            .plan
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let scores: Vec<f32> = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .iter()
            .copied()
            .collect();
        LabelScores::from_outputs(&loaded.labels, &scores)
    }

    fn close(&mut self) {
        if self.loaded.take().is_some() {
            log::info!("TractClassifier: closed {}", self.model_path.display());
        }
    }
}
