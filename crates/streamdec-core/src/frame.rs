use std::fmt;

use image::RgbImage;

use crate::error::LayoutViolation;

/// Frames are decoded as 24-bit RGB.
pub const BYTES_PER_PIXEL: usize = 3;

/// A single decoded picture, immutable once produced by the engine.
///
/// `data` is a row-major RGB byte buffer of exactly `height * rowsize`
/// bytes. `rowsize` is the stride between row starts and may exceed
/// `width * 3` when the engine aligns rows; bytes in `[width * 3, rowsize)`
/// of each row are padding with undefined content and must be stripped
/// before comparing pixels across frames.
#[derive(Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    rowsize: usize,
    data: Vec<u8>,
}

impl Frame {
    /// Build a frame from an engine-produced buffer, validating the
    /// layout contract. Any violation is fatal to the caller: it means
    /// the engine itself is broken.
    pub fn from_raw(
        width: u32,
        height: u32,
        rowsize: usize,
        data: Vec<u8>,
    ) -> Result<Self, LayoutViolation> {
        let data_len = data.len();
        let violation = |reason: &'static str| LayoutViolation {
            width,
            height,
            rowsize,
            data_len,
            reason,
        };

        if width == 0 || height == 0 {
            return Err(violation("width and height must be positive"));
        }
        if rowsize % BYTES_PER_PIXEL != 0 {
            return Err(violation("rowsize is not a whole number of pixels"));
        }
        if rowsize < width as usize * BYTES_PER_PIXEL {
            return Err(violation("rowsize is smaller than the visible row"));
        }
        if data_len != height as usize * rowsize {
            return Err(violation("buffer length does not match height * rowsize"));
        }

        Ok(Self {
            width,
            height,
            rowsize,
            data,
        })
    }

    /// Visible pixel columns, excluding stride padding.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Visible pixel rows.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Stride in bytes between the starts of consecutive rows.
    pub fn rowsize(&self) -> usize {
        self.rowsize
    }

    /// Raw row-major buffer, padding included.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Dense `width`×`height` RGB image with the per-row stride padding
    /// stripped.
    pub fn to_image(&self) -> RgbImage {
        let visible = self.width as usize * BYTES_PER_PIXEL;
        let mut out = Vec::with_capacity(visible * self.height as usize);
        for row in self.data.chunks_exact(self.rowsize) {
            out.extend_from_slice(&row[..visible]);
        }
        RgbImage::from_raw(self.width, self.height, out)
            .expect("buffer was sized to width * height above")
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("rowsize", &self.rowsize)
            .field("data_len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_accepts_padded_rows() {
        let frame = Frame::from_raw(2, 2, 9, vec![7u8; 18]).unwrap();
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.rowsize(), 9);
        assert_eq!(frame.data().len(), 18);
    }

    #[test]
    fn from_raw_rejects_zero_dimensions() {
        let err = Frame::from_raw(0, 2, 6, vec![0u8; 12]).unwrap_err();
        assert!(err.to_string().contains("positive"), "{err}");
    }

    #[test]
    fn from_raw_rejects_fractional_pixel_stride() {
        let err = Frame::from_raw(2, 2, 7, vec![0u8; 14]).unwrap_err();
        assert!(err.to_string().contains("whole number of pixels"), "{err}");
    }

    #[test]
    fn from_raw_rejects_stride_below_visible_row() {
        let err = Frame::from_raw(4, 2, 9, vec![0u8; 18]).unwrap_err();
        assert!(err.to_string().contains("smaller than the visible row"), "{err}");
    }

    #[test]
    fn from_raw_rejects_buffer_length_mismatch() {
        let err = Frame::from_raw(2, 2, 6, vec![0u8; 13]).unwrap_err();
        assert!(err.to_string().contains("height * rowsize"), "{err}");
    }

    #[test]
    fn to_image_strips_padding() {
        // 2x2 frame, 9-byte stride: 6 visible bytes + 3 padding per row.
        let mut data = Vec::new();
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 0xEE, 0xEE, 0xEE]);
        data.extend_from_slice(&[7, 8, 9, 10, 11, 12, 0xEE, 0xEE, 0xEE]);
        let frame = Frame::from_raw(2, 2, 9, data).unwrap();

        let img = frame.to_image();
        assert_eq!(img.dimensions(), (2, 2));
        let flat: Vec<u8> = img.into_raw();
        assert_eq!(flat, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        assert!(!flat.contains(&0xEE));
    }
}
