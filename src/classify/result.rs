use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

/// Label -> score mapping produced by a classifier.
///
/// Iteration is in lexicographic label order. `reduce` relies on this to
/// break ties toward the smallest label.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LabelScores {
    scores: BTreeMap<String, f32>,
}

impl LabelScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zip a model output vector with its label list. A duplicate label keeps
    /// the later score.
    pub fn from_outputs(labels: &[String], outputs: &[f32]) -> Result<Self> {
        if labels.len() != outputs.len() {
            return Err(anyhow!(
                "model produced {} scores for {} labels",
                outputs.len(),
                labels.len()
            ));
        }
        Ok(labels
            .iter()
            .cloned()
            .zip(outputs.iter().copied())
            .collect())
    }

    pub fn insert(&mut self, label: impl Into<String>, score: f32) {
        self.scores.insert(label.into(), score);
    }

    pub fn get(&self, label: &str) -> Option<f32> {
        self.scores.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.scores.iter().map(|(label, score)| (label.as_str(), *score))
    }
}

impl<S: Into<String>> FromIterator<(S, f32)> for LabelScores {
    fn from_iter<I: IntoIterator<Item = (S, f32)>>(iter: I) -> Self {
        Self {
            scores: iter
                .into_iter()
                .map(|(label, score)| (label.into(), score))
                .collect(),
        }
    }
}

/// Top label of one classified frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassificationResult {
    pub label: String,
    /// Score of `label`, in `[0, 1]` for probability outputs.
    pub confidence: f32,
    /// Sequence number of the frame this result came from.
    pub sequence: u64,
}

impl std::fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "class : {}, prob : {:.2}%",
            self.label,
            self.confidence * 100.0
        )
    }
}
