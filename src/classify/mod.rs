mod backend;
pub mod backends;
pub mod labels;
mod reduce;
mod registry;
mod result;

pub use backend::Classifier;
pub use backends::{ColorClassifier, StubClassifier};
#[cfg(feature = "backend-tract")]
pub use backends::TractClassifier;
pub use labels::{load_labels, parse_labels};
pub use reduce::reduce;
pub use registry::{shared, ClassifierRegistry, SharedClassifier};
pub use result::{ClassificationResult, LabelScores};
