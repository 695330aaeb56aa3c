pub mod color;
pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use color::ColorClassifier;
pub use stub::StubClassifier;

#[cfg(feature = "backend-tract")]
pub use tract::TractClassifier;
