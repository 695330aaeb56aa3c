/// Errors that abort a single pipeline cycle.
///
/// Every variant is local-recoverable: the cycle is dropped, the busy flag is
/// cleared and the next admitted frame starts fresh. Setup paths (config,
/// model loading) use `anyhow` instead.
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineError {
    /// Zero-sized frame, zero-sized target, or a buffer that does not match
    /// its declared format.
    InvalidDimensions { reason: String },
    /// Classifier has not been initialized (or was closed).
    NotReady,
    /// Classifier produced no labels.
    EmptyDistribution,
    /// The frame source could not supply a frame.
    SourceUnavailable(String),
    /// Classifier backend failed while running inference.
    Classifier(String),
}

impl PipelineError {
    pub(crate) fn invalid_dimensions(reason: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            reason: reason.into(),
        }
    }

    /// Short stable code, used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidDimensions { .. } => "INVALID_DIMENSIONS",
            Self::NotReady => "NOT_READY",
            Self::EmptyDistribution => "EMPTY_DISTRIBUTION",
            Self::SourceUnavailable(_) => "SOURCE_UNAVAILABLE",
            Self::Classifier(_) => "CLASSIFIER_FAILED",
        }
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDimensions { reason } => write!(f, "{}: {}", self.code(), reason),
            Self::NotReady => write!(f, "{}: classifier is not initialized", self.code()),
            Self::EmptyDistribution => {
                write!(f, "{}: classifier returned no labels", self.code())
            }
            Self::SourceUnavailable(reason) | Self::Classifier(reason) => {
                write!(f, "{}: {}", self.code(), reason)
            }
        }
    }
}

impl std::error::Error for PipelineError {}
