//! Camera frame source.
//!
//! `CameraSource` produces `Frame`s in the camera's native pixel format and
//! stamps them with the configured sensor orientation. Conversion to RGB is
//! left to the pipeline.

#[cfg(feature = "ingest-v4l2")]
use anyhow::Context;
use anyhow::Result;
#[cfg(feature = "ingest-v4l2")]
use ouroboros::self_referencing;
#[cfg(feature = "ingest-v4l2")]
use std::time::{Duration, Instant};

#[cfg(feature = "ingest-v4l2")]
use crate::orientation::{choose_optimal_size, Size};

use super::{FrameSource, SourceStats};
use crate::frame::{Frame, PixelFormat};

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0") or `stub://<name>` for a synthetic camera.
    pub url: String,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Mounting angle of the sensor relative to the device's natural orientation.
    pub sensor_orientation: i32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "/dev/video0".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
            sensor_orientation: 0,
        }
    }
}

/// Camera frame source.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.url.starts_with("stub://") {
            Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            })
        } else {
            #[cfg(feature = "ingest-v4l2")]
            {
                Ok(Self {
                    backend: CameraBackend::Device(DeviceCamera::new(config)),
                })
            }
            #[cfg(not(feature = "ingest-v4l2"))]
            {
                anyhow::bail!(
                    "camera {} requires the ingest-v4l2 feature (or a stub:// url)",
                    config.url
                )
            }
        }
    }
}

impl FrameSource for CameraSource {
    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.connect(),
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.next_frame(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(_) => true,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.is_healthy(),
        }
    }

    fn stats(&self) -> SourceStats {
        let (frames_captured, config) = match &self.backend {
            CameraBackend::Synthetic(source) => (source.frame_count, &source.config),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => (source.frame_count, &source.config),
        };
        SourceStats {
            frames_captured,
            location: config.url.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://) for tests and demos
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
    /// Changes every 50 frames so the classified color drifts over time.
    scene_state: u8,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            scene_state: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("CameraSource: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let pixels = self.generate_nv12()?;
        Ok(Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            PixelFormat::Nv12,
        )
        .with_sequence(self.frame_count)
        .with_sensor_orientation(self.config.sensor_orientation))
    }

    /// Luma ramp that scrolls one column per frame, flat chroma picked by
    /// the scene state.
    fn generate_nv12(&self) -> Result<Vec<u8>> {
        let (width, height) = (self.config.width, self.config.height);
        let len = PixelFormat::Nv12
            .expected_len(width, height)
            .ok_or_else(|| anyhow::anyhow!("synthetic frame dimensions overflow"))?;
        let y_plane = width as usize * height as usize;

        let mut pixels = vec![0u8; len];
        for (i, luma) in pixels[..y_plane].iter_mut().enumerate() {
            let x = i % width as usize;
            *luma = ((x as u64 + self.frame_count) % 256) as u8;
        }
        let (u, v) = match self.scene_state % 3 {
            0 => (90, 240),
            1 => (54, 34),
            _ => (240, 110),
        };
        for pair in pixels[y_plane..].chunks_exact_mut(2) {
            pair[0] = u;
            pair[1] = v;
        }
        Ok(pixels)
    }
}

// ----------------------------------------------------------------------------
// V4L2 device camera
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
struct DeviceCamera {
    config: CameraConfig,
    state: Option<DeviceState>,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
    active_format: PixelFormat,
}

#[cfg(feature = "ingest-v4l2")]
#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

#[cfg(feature = "ingest-v4l2")]
impl DeviceCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            active_format: PixelFormat::Yuyv,
            config,
            state: None,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        }
    }

    fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.url)
            .with_context(|| format!("open v4l2 device {}", self.config.url))?;
        let fourcc = v4l::FourCC::new(&PixelFormat::Yuyv.fourcc());
        let size = self.capture_size(&device, fourcc);
        let mut format = device.format().context("read v4l2 format")?;
        format.width = size.width;
        format.height = size.height;
        format.fourcc = fourcc;

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "CameraSource: failed to set format on {}: {}",
                    self.config.url,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        let active_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow::anyhow!(
                "v4l2 device {} negotiated unsupported format {}",
                self.config.url,
                format.fourcc
            )
        })?;

        let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
        if let Err(err) = device.set_params(&params) {
            log::warn!(
                "CameraSource: failed to set fps on {}: {}",
                self.config.url,
                err
            );
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.active_format = active_format;
        self.last_error = None;

        let state = DeviceStateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);

        log::info!(
            "CameraSource: connected to {} ({}x{} {:?})",
            self.config.url,
            self.active_width,
            self.active_height,
            self.active_format
        );
        Ok(())
    }

    /// Best discrete size the device offers for `fourcc`, falling back to the
    /// configured size when the device does not enumerate any.
    fn capture_size(&self, device: &v4l::Device, fourcc: v4l::FourCC) -> Size {
        use v4l::framesize::FrameSizeEnum;
        use v4l::video::Capture;

        let requested = Size::new(self.config.width, self.config.height);
        let choices: Vec<Size> = match device.enum_framesizes(fourcc) {
            Ok(sizes) => sizes
                .into_iter()
                .filter_map(|frame_size| match frame_size.size {
                    FrameSizeEnum::Discrete(discrete) => {
                        Some(Size::new(discrete.width, discrete.height))
                    }
                    FrameSizeEnum::Stepwise(_) => None,
                })
                .collect(),
            Err(err) => {
                log::warn!(
                    "CameraSource: failed to list frame sizes on {}: {}",
                    self.config.url,
                    err
                );
                Vec::new()
            }
        };
        let chosen = choose_optimal_size(&choices, requested.width, requested.height)
            .unwrap_or(requested);
        if chosen != requested {
            log::info!(
                "CameraSource: {}x{} not offered by {}, using {}x{}",
                requested.width,
                requested.height,
                self.config.url,
                chosen.width,
                chosen.height
            );
        }
        chosen
    }

    fn next_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let expected = self
            .active_format
            .expected_len(self.active_width, self.active_height)
            .context("v4l2 frame dimensions overflow")?;
        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let pixels = state
            .with_stream_mut(|stream| {
                let (buf, meta) = stream.next()?;
                let used = (meta.bytesused as usize).min(buf.len());
                Ok::<_, std::io::Error>(buf[..used.min(expected)].to_vec())
            })
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                anyhow::Error::new(err).context("capture v4l2 frame")
            })?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());

        Ok(Frame::new(
            pixels,
            self.active_width,
            self.active_height,
            self.active_format,
        )
        .with_sequence(self.frame_count)
        .with_sensor_orientation(self.config.sensor_orientation))
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn health_grace(&self) -> Duration {
        let base_ms = (1000 / self.config.target_fps.max(1)).saturating_mul(6);
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::to_rgb;

    fn stub_config() -> CameraConfig {
        CameraConfig {
            url: "stub://test".to_string(),
            target_fps: 10,
            width: 64,
            height: 48,
            sensor_orientation: 90,
        }
    }

    #[test]
    fn stub_camera_produces_nv12_frames() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        source.connect()?;

        let frame = source.next_frame()?;
        assert_eq!((frame.width, frame.height), (64, 48));
        assert_eq!(frame.format, PixelFormat::Nv12);
        assert_eq!(frame.sensor_orientation, 90);
        assert_eq!(frame.pixels().len(), 64 * 48 * 3 / 2);

        let rgb = to_rgb(frame.pixels(), frame.width, frame.height, frame.format)?;
        assert_eq!(rgb.data.len(), 64 * 48 * 3);
        Ok(())
    }

    #[test]
    fn stub_camera_numbers_frames() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        source.connect()?;

        let first = source.next_frame()?;
        let second = source.next_frame()?;
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_ne!(first.pixels(), second.pixels());

        let stats = source.stats();
        assert_eq!(stats.frames_captured, 2);
        assert_eq!(stats.location, "stub://test");
        assert!(source.is_healthy());
        Ok(())
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    #[test]
    fn device_paths_require_feature() {
        let config = CameraConfig {
            url: "/dev/video0".to_string(),
            ..stub_config()
        };
        assert!(CameraSource::new(config).is_err());
    }
}
