#![cfg(feature = "ingest-image")]

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use super::{FrameSource, SourceStats};
use crate::frame::{Frame, PixelFormat};

/// Decodes one local image file and replays it as RGB frames.
///
/// Handy for checking a model against a known picture without a camera.
pub struct StillImageSource {
    path: PathBuf,
    sensor_orientation: i32,
    decoded: Option<(Vec<u8>, u32, u32)>,
    frame_count: u64,
}

impl StillImageSource {
    pub fn new(path: impl Into<PathBuf>, sensor_orientation: i32) -> Self {
        Self {
            path: path.into(),
            sensor_orientation,
            decoded: None,
            frame_count: 0,
        }
    }
}

impl FrameSource for StillImageSource {
    fn connect(&mut self) -> Result<()> {
        let image = image::open(&self.path)
            .with_context(|| format!("decode image {}", self.path.display()))?
            .to_rgb8();
        let (width, height) = image.dimensions();
        log::info!(
            "StillImageSource: loaded {} ({}x{})",
            self.path.display(),
            width,
            height
        );
        self.decoded = Some((image.into_raw(), width, height));
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let (pixels, width, height) = self
            .decoded
            .as_ref()
            .ok_or_else(|| anyhow!("image {} not loaded", self.path.display()))?;
        self.frame_count += 1;
        Ok(
            Frame::new(pixels.clone(), *width, *height, PixelFormat::Rgb24)
                .with_sequence(self.frame_count)
                .with_sensor_orientation(self.sensor_orientation),
        )
    }

    fn is_healthy(&self) -> bool {
        self.decoded.is_some()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            location: self.path.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_decoded_png() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("red.png");
        image::RgbImage::from_pixel(4, 2, image::Rgb([255, 0, 0])).save(&path)?;

        let mut source = StillImageSource::new(&path, 0);
        assert!(source.next_frame().is_err());
        source.connect()?;

        let frame = source.next_frame()?;
        assert_eq!((frame.width, frame.height), (4, 2));
        assert_eq!(frame.format, PixelFormat::Rgb24);
        assert_eq!(&frame.pixels()[..3], &[255, 0, 0]);
        assert_eq!(source.next_frame()?.sequence, 2);
        Ok(())
    }
}
