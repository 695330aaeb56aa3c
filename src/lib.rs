//! Camera Classifier
//!
//! On-device image classification for a live camera stream.
//!
//! # Architecture
//!
//! A producer pulls raw frames from a source and offers them to a
//! single-flight pipeline. The pipeline holds at most one frame at a time:
//!
//! 1. **Drop newest**: a frame offered while a cycle is in flight is released
//!    immediately. Frames are never queued and the producer never blocks.
//! 2. **Deterministic preprocessing**: color conversion, center crop, resize,
//!    rotation and normalization always run in that order.
//! 3. **Total argmax**: ties resolve to the lexicographically smallest label.
//!
//! # Module Structure
//!
//! - `frame`: Raw camera frames and pixel formats
//! - `ingest`: Frame sources (synthetic camera, V4L2, still images)
//! - `orientation`: Rotation arithmetic and preview size selection
//! - `preprocess`: Frame to classifier tensor
//! - `classify`: Classifier backends, registry and argmax reduction
//! - `pipeline`: Admission control and the inference worker
//! - `config`: Daemon configuration

pub mod classify;
pub mod config;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod orientation;
pub mod pipeline;
pub mod preprocess;

pub use classify::{
    reduce, ClassificationResult, Classifier, ClassifierRegistry, LabelScores, SharedClassifier,
};
pub use config::ClassifierdConfig;
pub use error::PipelineError;
pub use frame::{Frame, PixelFormat};
pub use ingest::{CameraConfig, CameraSource, FrameSource};
pub use orientation::{choose_optimal_size, effective_rotation, Rotation, Size};
pub use pipeline::{FramePipeline, PipelineConfig, PipelineStats, ResultSink};
pub use preprocess::{prepare, Normalization, PreparedImage};
