use super::RgbImage;

impl RgbImage {
    fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let offset = (y * self.width as usize + x) * 3;
        [self.data[offset], self.data[offset + 1], self.data[offset + 2]]
    }

    /// Crop the largest centered square. The offset along the longer axis is
    /// `(long - side) / 2`, rounded down.
    pub fn crop_center_square(&self) -> RgbImage {
        let w = self.width as usize;
        let h = self.height as usize;
        let side = w.min(h);
        let x0 = (w - side) / 2;
        let y0 = (h - side) / 2;

        let mut data = Vec::with_capacity(side * side * 3);
        for y in y0..y0 + side {
            let row = (y * w + x0) * 3;
            data.extend_from_slice(&self.data[row..row + side * 3]);
        }
        RgbImage {
            width: side as u32,
            height: side as u32,
            data,
        }
    }

    /// Nearest-neighbor resample: `src = floor(dst * src_size / dst_size)`.
    pub fn resize_nearest(&self, width: u32, height: u32) -> RgbImage {
        let (sw, sh) = (self.width as usize, self.height as usize);
        let (dw, dh) = (width as usize, height as usize);
        let mut data = vec![0u8; dw * dh * 3];
        for y in 0..dh {
            let src_y = (y * sh / dh).min(sh - 1);
            for x in 0..dw {
                let src_x = (x * sw / dw).min(sw - 1);
                let offset = (y * dw + x) * 3;
                data[offset..offset + 3].copy_from_slice(&self.pixel(src_x, src_y));
            }
        }
        RgbImage {
            width,
            height,
            data,
        }
    }

    /// Rotate counter-clockwise by `quarter_turns` x 90 degrees.
    pub fn rotate_ccw(&self, quarter_turns: u8) -> RgbImage {
        match quarter_turns % 4 {
            0 => self.clone(),
            1 => self.remap(self.height, self.width, |x, y, w, _| (w - 1 - y, x)),
            2 => self.remap(self.width, self.height, |x, y, w, h| {
                (w - 1 - x, h - 1 - y)
            }),
            _ => self.remap(self.height, self.width, |x, y, _, h| (y, h - 1 - x)),
        }
    }

    /// Build an image of `out_w` x `out_h` where each output pixel `(x, y)`
    /// reads the source at `source(x, y, src_w, src_h)`.
    fn remap(
        &self,
        out_w: u32,
        out_h: u32,
        source: impl Fn(usize, usize, usize, usize) -> (usize, usize),
    ) -> RgbImage {
        let (sw, sh) = (self.width as usize, self.height as usize);
        let mut data = vec![0u8; out_w as usize * out_h as usize * 3];
        for y in 0..out_h as usize {
            for x in 0..out_w as usize {
                let (src_x, src_y) = source(x, y, sw, sh);
                let offset = (y * out_w as usize + x) * 3;
                data[offset..offset + 3].copy_from_slice(&self.pixel(src_x, src_y));
            }
        }
        RgbImage {
            width: out_w,
            height: out_h,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Image whose red channel holds the pixel index.
    fn indexed(width: u32, height: u32) -> RgbImage {
        let data = (0..width * height)
            .flat_map(|i| [i as u8, 0, 0])
            .collect();
        RgbImage {
            width,
            height,
            data,
        }
    }

    fn reds(image: &RgbImage) -> Vec<u8> {
        image.data.chunks_exact(3).map(|px| px[0]).collect()
    }

    #[test]
    fn crop_keeps_centered_square() {
        // 4 wide, 2 tall: columns 1..3 survive.
        let cropped = indexed(4, 2).crop_center_square();
        assert_eq!((cropped.width, cropped.height), (2, 2));
        assert_eq!(reds(&cropped), vec![1, 2, 5, 6]);

        // 1 wide, 3 tall: middle row survives.
        let cropped = indexed(1, 3).crop_center_square();
        assert_eq!(reds(&cropped), vec![1]);
    }

    #[test]
    fn resize_picks_nearest_source() {
        let resized = indexed(4, 4).resize_nearest(2, 2);
        assert_eq!(reds(&resized), vec![0, 2, 8, 10]);

        let upscaled = indexed(2, 1).resize_nearest(4, 1);
        assert_eq!(reds(&upscaled), vec![0, 0, 1, 1]);
    }

    #[test]
    fn rotation_is_counter_clockwise() {
        // 0 1 2
        // 3 4 5
        let image = indexed(3, 2);

        let quarter = image.rotate_ccw(1);
        assert_eq!((quarter.width, quarter.height), (2, 3));
        assert_eq!(reds(&quarter), vec![2, 5, 1, 4, 0, 3]);

        let half = image.rotate_ccw(2);
        assert_eq!(reds(&half), vec![5, 4, 3, 2, 1, 0]);

        let three = image.rotate_ccw(3);
        assert_eq!(reds(&three), vec![3, 0, 4, 1, 5, 2]);

        assert_eq!(image.rotate_ccw(4), image);
    }
}
