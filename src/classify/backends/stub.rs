use anyhow::{bail, Result};
use sha2::{Digest, Sha256};

use crate::classify::backend::Classifier;
use crate::classify::result::LabelScores;
use crate::orientation::Size;
use crate::preprocess::PreparedImage;

/// Stub backend for testing. Derives deterministic scores from a digest of
/// the prepared tensor, so identical images always score identically.
pub struct StubClassifier {
    labels: Vec<String>,
    input: Size,
    ready: bool,
}

impl StubClassifier {
    pub fn new(labels: Vec<String>, input: Size) -> Self {
        Self {
            labels,
            input,
            ready: false,
        }
    }

    /// Labels used when no label file is configured.
    pub fn default_labels() -> Vec<String> {
        ["background", "cat", "dog"]
            .iter()
            .map(|label| label.to_string())
            .collect()
    }
}

impl Default for StubClassifier {
    fn default() -> Self {
        Self::new(Self::default_labels(), Size::new(224, 224))
    }
}

impl Classifier for StubClassifier {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn initialize(&mut self) -> Result<()> {
        if self.labels.is_empty() {
            bail!("stub classifier needs at least one label");
        }
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
            bail!("stub classifier is not initialized");
        }
        let mut hasher = Sha256::new();
        for value in &image.data {
            hasher.update(value.to_le_bytes());
        }
        let digest: [u8; 32] = hasher.finalize().into();

        let raw: Vec<f32> = (0..self.labels.len())
            .map(|i| digest[i % digest.len()] as f32 + 1.0)
            .collect();
        let total: f32 = raw.iter().sum();
        let scores: Vec<f32> = raw.iter().map(|value| value / total).collect();
        LabelScores::from_outputs(&self.labels, &scores)
    }

    fn close(&mut self) {
        self.ready = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(fill: f32) -> PreparedImage {
        PreparedImage {
            width: 2,
            height: 2,
            data: vec![fill; 12],
        }
    }

    #[test]
    fn stub_requires_initialize() {
        let mut classifier = StubClassifier::default();
        assert!(!classifier.is_ready());
        assert_eq!(classifier.input_size(), None);
        assert!(classifier.classify(&image(0.5)).is_err());
    }

    #[test]
    fn stub_scores_are_deterministic_probabilities() -> Result<()> {
        let mut classifier = StubClassifier::default();
        classifier.initialize()?;
        assert_eq!(classifier.input_size(), Some(Size::new(224, 224)));

        let a = classifier.classify(&image(0.5))?;
        let b = classifier.classify(&image(0.5))?;
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);

        let total: f32 = a.iter().map(|(_, score)| score).sum();
        assert!((total - 1.0).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn close_is_idempotent() -> Result<()> {
        let mut classifier = StubClassifier::default();
        classifier.initialize()?;
        classifier.close();
        classifier.close();
        assert!(!classifier.is_ready());
        Ok(())
    }
}
