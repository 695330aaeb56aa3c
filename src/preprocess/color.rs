use crate::error::PipelineError;
use crate::frame::PixelFormat;

use super::RgbImage;

/// Convert a native sensor buffer into interleaved RGB.
///
/// YUV layouts use full-range BT.601 coefficients.
pub fn to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<RgbImage, PipelineError> {
    let expected = format.expected_len(width, height).ok_or_else(|| {
        PipelineError::invalid_dimensions(format!("{:?} frame dimensions overflow", format))
    })?;
    if pixels.len() != expected {
        return Err(PipelineError::invalid_dimensions(format!(
            "{:?} frame length mismatch: expected {}, got {}",
            format,
            expected,
            pixels.len()
        )));
    }

    let w = width as usize;
    let h = height as usize;
    let data = match format {
        PixelFormat::Rgb24 => pixels.to_vec(),
        PixelFormat::Rgba8888 => pixels
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect(),
        PixelFormat::Nv12 => semi_planar_to_rgb(pixels, w, h, false),
        PixelFormat::Nv21 => semi_planar_to_rgb(pixels, w, h, true),
        PixelFormat::I420 => planar_to_rgb(pixels, w, h),
        PixelFormat::Yuyv => {
            if w % 2 != 0 {
                return Err(PipelineError::invalid_dimensions(format!(
                    "YUYV frame width must be even, got {}",
                    w
                )));
            }
            packed_422_to_rgb(pixels)
        }
    };

    Ok(RgbImage {
        width,
        height,
        data,
    })
}

fn semi_planar_to_rgb(pixels: &[u8], w: usize, h: usize, vu_order: bool) -> Vec<u8> {
    let y_plane = w * h;
    let chroma_stride = w.div_ceil(2) * 2;
    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i];
            let uv_index = y_plane + (j / 2) * chroma_stride + (i / 2) * 2;
            let (u, v) = if vu_order {
                (pixels[uv_index + 1], pixels[uv_index])
            } else {
                (pixels[uv_index], pixels[uv_index + 1])
            };
            write_pixel(&mut rgb, j * w + i, y, u, v);
        }
    }
    rgb
}

fn planar_to_rgb(pixels: &[u8], w: usize, h: usize) -> Vec<u8> {
    let y_plane = w * h;
    let cw = w.div_ceil(2);
    let chroma_plane = cw * h.div_ceil(2);
    let (u_plane, v_plane) = pixels[y_plane..].split_at(chroma_plane);
    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let chroma = (j / 2) * cw + i / 2;
            write_pixel(
                &mut rgb,
                j * w + i,
                pixels[j * w + i],
                u_plane[chroma],
                v_plane[chroma],
            );
        }
    }
    rgb
}

fn packed_422_to_rgb(pixels: &[u8]) -> Vec<u8> {
    let mut rgb = vec![0u8; pixels.len() / 2 * 3];
    for (pair, quad) in pixels.chunks_exact(4).enumerate() {
        let (y0, u, y1, v) = (quad[0], quad[1], quad[2], quad[3]);
        write_pixel(&mut rgb, pair * 2, y0, u, v);
        write_pixel(&mut rgb, pair * 2 + 1, y1, u, v);
    }
    rgb
}

fn write_pixel(rgb: &mut [u8], index: usize, y: u8, u: u8, v: u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = y + 1.402_f32 * v;
    let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
    let b = y + 1.772_f32 * u;

    let offset = index * 3;
    rgb[offset] = clamp_to_u8(r);
    rgb[offset + 1] = clamp_to_u8(g);
    rgb[offset + 2] = clamp_to_u8(b);
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
