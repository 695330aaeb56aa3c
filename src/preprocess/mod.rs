//! Frame preprocessing.
//!
//! `prepare` turns a raw `Frame` into the tensor a classifier consumes. The
//! steps run in a fixed order, and reordering them changes the output:
//!
//! 1. color conversion to RGB
//! 2. centered square crop
//! 3. nearest-neighbor resize to the classifier input size
//! 4. counter-clockwise quarter-turn rotation
//! 5. per-channel normalization
//!
//! The function is pure: identical inputs give identical output.

mod color;
mod geometry;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::frame::Frame;
use crate::orientation::Rotation;

pub use color::to_rgb;

/// Channels in every `RgbImage` and `PreparedImage`.
pub const CHANNELS: usize = 3;

/// Interleaved 8-bit RGB image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Affine normalization `x' = (x - mean) / stddev`, applied to every channel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub mean: f32,
    pub stddev: f32,
}

impl Normalization {
    /// Maps `[0, 255]` onto `[0.0, 1.0]`.
    pub const UNIT: Normalization = Normalization {
        mean: 0.0,
        stddev: 255.0,
    };

    pub fn apply(&self, value: u8) -> f32 {
        (value as f32 - self.mean) / self.stddev
    }

    pub fn invert(&self, value: f32) -> f32 {
        value * self.stddev + self.mean
    }
}

impl Default for Normalization {
    fn default() -> Self {
        Self::UNIT
    }
}

/// Classifier-ready tensor, HWC order (`height x width x 3`).
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl PreparedImage {
    pub fn channels(&self) -> usize {
        CHANNELS
    }

    /// Normalized values of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 3] {
        let offset = (y as usize * self.width as usize + x as usize) * CHANNELS;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ]
    }
}

/// Prepare `frame` for a classifier with a `target_width` x `target_height`
/// input, rotated by `rotation_degrees` (see [`Rotation::from_degrees`]).
pub fn prepare(
    frame: &Frame,
    target_width: u32,
    target_height: u32,
    rotation_degrees: i32,
) -> Result<PreparedImage, PipelineError> {
    prepare_with(
        frame,
        target_width,
        target_height,
        Rotation::from_degrees(rotation_degrees),
        Normalization::UNIT,
    )
}

/// `prepare` with an already normalized rotation and explicit normalization.
pub fn prepare_with(
    frame: &Frame,
    target_width: u32,
    target_height: u32,
    rotation: Rotation,
    normalization: Normalization,
) -> Result<PreparedImage, PipelineError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(PipelineError::invalid_dimensions(format!(
            "frame is {}x{}",
            frame.width, frame.height
        )));
    }
    if target_width == 0 || target_height == 0 {
        return Err(PipelineError::invalid_dimensions(format!(
            "target is {}x{}",
            target_width, target_height
        )));
    }

    let rgb = to_rgb(frame.pixels(), frame.width, frame.height, frame.format)?;
    Ok(finish(&rgb, target_width, target_height, rotation, normalization))
}

/// Steps 2..5 on an already converted image.
fn finish(
    rgb: &RgbImage,
    target_width: u32,
    target_height: u32,
    rotation: Rotation,
    normalization: Normalization,
) -> PreparedImage {
    let turns = rotation.quarter_turns();
    // Odd turns swap the axes, so resize to the transposed target first.
    let (width, height) = if turns % 2 == 1 {
        (target_height, target_width)
    } else {
        (target_width, target_height)
    };
    let rotated = rgb
        .crop_center_square()
        .resize_nearest(width, height)
        .rotate_ccw(turns);

    PreparedImage {
        width: rotated.width,
        height: rotated.height,
        data: rotated
            .data
            .iter()
            .map(|&value| normalization.apply(value))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;

    /// Red holds the column, green the row.
    fn gradient_frame(width: u32, height: u32) -> Frame {
        let data = (0..height)
            .flat_map(|y| (0..width).flat_map(move |x| [x as u8, y as u8, 7]))
            .collect();
        Frame::new(data, width, height, PixelFormat::Rgb24)
    }

    fn to_u8(value: f32) -> u8 {
        Normalization::UNIT.invert(value).round() as u8
    }

    #[test]
    fn tall_frame_is_cropped_resized_and_rotated() -> anyhow::Result<()> {
        let frame = gradient_frame(100, 200);
        let prepared = prepare(&frame, 50, 50, 90)?;

        assert_eq!((prepared.width, prepared.height), (50, 50));
        assert_eq!(prepared.data.len(), 50 * 50 * 3);

        // Crop keeps rows 50..150; resize samples every second row/column;
        // a counter-clockwise turn moves the last column to the first row.
        let top_left = prepared.pixel(0, 0);
        assert_eq!(to_u8(top_left[0]), 98);
        assert_eq!(to_u8(top_left[1]), 50);

        let bottom_right = prepared.pixel(49, 49);
        assert_eq!(to_u8(bottom_right[0]), 0);
        assert_eq!(to_u8(bottom_right[1]), 148);

        assert!(prepared.data.iter().all(|v| (0.0..=1.0).contains(v)));
        Ok(())
    }

    #[test]
    fn non_square_target_keeps_shape_for_every_rotation() -> anyhow::Result<()> {
        let frame = gradient_frame(8, 6);
        for degrees in [0, 90, 180, 270] {
            let prepared = prepare(&frame, 4, 2, degrees)?;
            assert_eq!((prepared.width, prepared.height), (4, 2), "rotation {}", degrees);
            assert_eq!(prepared.data.len(), 4 * 2 * 3);
        }

        // Crop keeps columns 1..7 and the resize samples every third one; a
        // quarter turn puts the last sampled column on the top row.
        let turned = prepare(&frame, 4, 2, 90)?;
        assert_eq!(to_u8(turned.pixel(0, 0)[0]), 4);
        assert_eq!(to_u8(turned.pixel(0, 0)[1]), 0);
        Ok(())
    }

    #[test]
    fn prepare_is_deterministic() -> anyhow::Result<()> {
        let frame = gradient_frame(64, 48);
        let a = prepare(&frame, 32, 32, 270)?;
        let b = prepare(&frame, 32, 32, 270)?;
        let a_bits: Vec<u32> = a.data.iter().map(|v| v.to_bits()).collect();
        let b_bits: Vec<u32> = b.data.iter().map(|v| v.to_bits()).collect();
        assert_eq!(a_bits, b_bits);
        Ok(())
    }

    #[test]
    fn normalization_round_trips_through_inverse() {
        let norm = Normalization::UNIT;
        for value in 0..=255u8 {
            let restored = norm.invert(norm.apply(value));
            assert!((restored - value as f32).abs() < 1e-3, "value {}", value);
        }
        assert_eq!(norm.apply(0), 0.0);
        assert_eq!(norm.apply(255), 1.0);
    }

    #[test]
    fn custom_normalization_centers_values() -> anyhow::Result<()> {
        let frame = Frame::new(vec![127, 127, 127], 1, 1, PixelFormat::Rgb24);
        let norm = Normalization {
            mean: 127.5,
            stddev: 127.5,
        };
        let prepared = prepare_with(&frame, 1, 1, Rotation::Deg0, norm)?;
        assert!(prepared.data.iter().all(|v| v.abs() < 0.01));
        Ok(())
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let empty = Frame::new(Vec::new(), 0, 10, PixelFormat::Rgb24);
        assert!(matches!(
            prepare(&empty, 10, 10, 0),
            Err(PipelineError::InvalidDimensions { .. })
        ));

        let frame = gradient_frame(4, 4);
        assert!(matches!(
            prepare(&frame, 0, 10, 0),
            Err(PipelineError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            prepare(&frame, 10, 0, 0),
            Err(PipelineError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn yuv_frames_are_converted_before_geometry() -> anyhow::Result<()> {
        let nv12 = [vec![200u8; 16], vec![128u8; 8]].concat();
        let frame = Frame::new(nv12, 4, 4, PixelFormat::Nv12);
        let prepared = prepare(&frame, 2, 2, 0)?;
        let expected = 200.0 / 255.0;
        assert!(prepared.data.iter().all(|v| (v - expected).abs() < 1e-6));
        Ok(())
    }
}
