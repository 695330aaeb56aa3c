use anyhow::{bail, Result};

use crate::classify::backend::Classifier;
use crate::classify::result::LabelScores;
use crate::orientation::Size;
use crate::preprocess::PreparedImage;

const LABELS: [&str; 3] = ["red", "green", "blue"];

/// CPU backend that needs no model: scores each primary color by its share
/// of the mean channel intensity.
pub struct ColorClassifier {
    input: Size,
    ready: bool,
}

impl ColorClassifier {
    pub fn new(input: Size) -> Self {
        Self {
            input,
            ready: false,
        }
    }
}

impl Default for ColorClassifier {
    fn default() -> Self {
        Self::new(Size::new(224, 224))
    }
}

impl Classifier for ColorClassifier {
    fn name(&self) -> &'static str {
        "color"
    }

    fn initialize(&mut self) -> Result<()> {
        self.ready = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn input_size(&self) -> Option<Size> {
        self.ready.then_some(self.input)
    }

    fn classify(&mut self, image: &PreparedImage) -> Result<LabelScores> {
        if !self.ready {
            bail!("color classifier is not initialized");
        }
        let mut sums = [0f64; 3];
        for px in image.data.chunks_exact(3) {
            for (sum, value) in sums.iter_mut().zip(px) {
                *sum += value.max(0.0) as f64;
            }
        }
        let total: f64 = sums.iter().sum();
        let shares = if total > 0.0 {
            sums.map(|sum| (sum / total) as f32)
        } else {
            [1.0 / 3.0; 3]
        };
        Ok(LABELS.into_iter().zip(shares).collect())
    }

    fn close(&mut self) {
        self.ready = false;
    }
}
