use crate::error::PipelineError;

use super::result::LabelScores;

/// Sentinel below every valid score, so any real score wins.
const NO_WINNER: f32 = -1.0;

/// Pick the highest-scoring label.
///
/// Ties go to the first label in iteration order, i.e. the lexicographically
/// smallest one.
pub fn reduce(scores: &LabelScores) -> Result<(String, f32), PipelineError> {
    let mut best_label: Option<&str> = None;
    let mut best_score = NO_WINNER;
    for (label, score) in scores.iter() {
        if score > best_score {
            best_label = Some(label);
            best_score = score;
        }
    }
    match best_label {
        Some(label) => Ok((label.to_string(), best_score)),
        None if scores.is_empty() => Err(PipelineError::EmptyDistribution),
        None => Err(PipelineError::Classifier(format!(
            "none of {} scores is a valid probability",
            scores.len()
        ))),
    }
}
