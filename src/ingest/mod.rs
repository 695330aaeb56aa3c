//! Frame sources.
//!
//! - `CameraSource`: camera capture. `stub://` URLs produce a synthetic NV12
//!   test pattern; device paths use V4L2 (feature: ingest-v4l2).
//! - `StillImageSource`: replays one decoded image file (feature: ingest-image).
//!
//! Sources run on the producer side. They assign each frame its sequence
//! number and sensor orientation, and never block on the pipeline: a frame
//! the pipeline rejects is simply dropped.

pub mod camera;
#[cfg(feature = "ingest-image")]
pub mod still;

use anyhow::Result;

use crate::frame::Frame;

pub use camera::{CameraConfig, CameraSource};
#[cfg(feature = "ingest-image")]
pub use still::StillImageSource;

/// Producer of raw frames.
pub trait FrameSource {
    /// Open the underlying device or stream.
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Check if the source is healthy.
    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub location: String,
}
