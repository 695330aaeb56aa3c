use anyhow::Result;

use crate::orientation::Size;
use crate::preprocess::PreparedImage;

use super::result::LabelScores;

/// Image classifier backend.
///
/// The pipeline only calls `classify` from its single worker thread while a
/// cycle is in flight, so implementations need not be reentrant. They are
/// shared behind `Arc<Mutex<..>>` and must therefore be `Send`.
pub trait Classifier: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Load model resources. Must be called before `classify`.
    fn initialize(&mut self) -> Result<()>;

    fn is_ready(&self) -> bool;

    /// Input width and height the model expects; `None` until initialized.
    fn input_size(&self) -> Option<Size>;

    /// Score every known label for a prepared image.
    fn classify(&mut self, image: &PreparedImage) -> Result<LabelScores>;

    /// Release model resources. Calling it twice is a no-op.
    fn close(&mut self);
}
