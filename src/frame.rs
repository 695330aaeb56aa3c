//! Raw camera frames.
//!
//! - `Frame`: one captured sensor image. Not `Clone`; the pipeline owns it for
//!   exactly one cycle.
//! - `PixelFormat`: the native layouts a source may hand over.
//!
//! A frame can carry a release hook. The hook runs when the frame is dropped,
//! which is how a source learns its buffer is free again (after conversion,
//! or immediately when the frame is rejected at admission).

use std::time::Instant;

/// Native pixel layout of a frame buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Interleaved 8-bit RGB.
    Rgb24,
    /// Interleaved 8-bit RGBA. Alpha is discarded on conversion.
    Rgba8888,
    /// Y plane followed by interleaved UV at quarter resolution.
    Nv12,
    /// Y plane followed by interleaved VU at quarter resolution.
    Nv21,
    /// Y, U and V planes, chroma at quarter resolution (YUV_420_888 layout).
    I420,
    /// Packed 4:2:2, `Y0 U Y1 V` per pixel pair.
    Yuyv,
}

impl PixelFormat {
    /// Number of bytes a `width` x `height` buffer occupies, or `None` on overflow.
    pub fn expected_len(self, width: u32, height: u32) -> Option<usize> {
        let w = width as usize;
        let h = height as usize;
        let pixels = w.checked_mul(h)?;
        match self {
            PixelFormat::Rgb24 => pixels.checked_mul(3),
            PixelFormat::Rgba8888 => pixels.checked_mul(4),
            PixelFormat::Nv12 | PixelFormat::Nv21 | PixelFormat::I420 => {
                let chroma = w.div_ceil(2).checked_mul(h.div_ceil(2))?;
                pixels.checked_add(chroma.checked_mul(2)?)
            }
            PixelFormat::Yuyv => pixels.checked_mul(2),
        }
    }

    /// V4L2 fourcc code for this layout.
    pub fn fourcc(self) -> [u8; 4] {
        match self {
            PixelFormat::Rgb24 => *b"RGB3",
            PixelFormat::Rgba8888 => *b"AB24",
            PixelFormat::Nv12 => *b"NV12",
            PixelFormat::Nv21 => *b"NV21",
            PixelFormat::I420 => *b"YU12",
            PixelFormat::Yuyv => *b"YUYV",
        }
    }

    pub fn from_fourcc(code: &[u8; 4]) -> Option<Self> {
        match code {
            b"RGB3" => Some(PixelFormat::Rgb24),
            b"AB24" => Some(PixelFormat::Rgba8888),
            b"NV12" => Some(PixelFormat::Nv12),
            b"NV21" => Some(PixelFormat::Nv21),
            b"YU12" => Some(PixelFormat::I420),
            b"YUYV" => Some(PixelFormat::Yuyv),
            _ => None,
        }
    }
}

/// Callback invoked with the frame sequence number when the frame is released.
pub type ReleaseHook = Box<dyn FnOnce(u64) + Send>;

/// One captured sensor image.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Monotonic per-source sequence number.
    pub sequence: u64,
    /// Sensor orientation in degrees, as reported by the source.
    pub sensor_orientation: i32,
    captured_at: Instant,
    release: Option<ReleaseHook>,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
            sequence: 0,
            sensor_orientation: 0,
            captured_at: Instant::now(),
            release: None,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_sensor_orientation(mut self, degrees: i32) -> Self {
        self.sensor_orientation = degrees;
        self
    }

    /// Attach a hook that runs once when this frame is dropped.
    pub fn with_release(mut self, hook: impl FnOnce(u64) + Send + 'static) -> Self {
        self.release = Some(Box::new(hook));
        self
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Milliseconds since capture.
    pub fn age_ms(&self) -> u128 {
        self.captured_at.elapsed().as_millis()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("sequence", &self.sequence)
            .field("sensor_orientation", &self.sensor_orientation)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.sequence);
        }
    }
}
