//! Shared test utilities: synthetic reference movies with analytic ground
//! truth, frame comparison helpers, and a deterministic stand-in engine
//! for session-level tests.
//!
//! The reference movie is a gaussian blob moving in a zig-zag across a
//! 32×32 picture. Ground truth is computed analytically, encoded to a raw
//! Annex-B H.264 stream in-process, and compared after decoding with
//! tolerances that account for the lossy recompression.

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use openh264::encoder::{Encoder, EncoderConfig, RateControlMode};
use openh264::formats::YUVSlices;
use openh264::OpenH264API;
use tracing::info;

use crate::codec::CodecEngine;
use crate::frame::Frame;

/// Edge length of the reference picture.
pub const BLOB_EDGE: u32 = 32;
/// Frame count of the full reference movie.
pub const MOVIE_FRAMES: usize = (BLOB_EDGE * BLOB_EDGE) as usize;

/// Ground-truth frames: a gaussian blob moving top to bottom in a
/// zig-zag, grayscale in RGB, `MOVIE_FRAMES` frames of
/// `BLOB_EDGE`×`BLOB_EDGE` pixels.
pub fn moving_blob_frames() -> Vec<RgbImage> {
    let n = BLOB_EDGE as usize;
    let sigma = 4.0 / n as f64;
    let axis: Vec<f64> = (0..n)
        .map(|i| -1.0 + 2.0 * i as f64 / (n - 1) as f64)
        .collect();

    (0..MOVIE_FRAMES)
        .map(|k| {
            let t = -0.8 + 1.6 * k as f64 / (MOVIE_FRAMES - 1) as f64;
            let cx = 0.8 * (t * std::f64::consts::PI * n as f64 * 0.5).cos();
            let cy = t;

            let mut vals = vec![0f64; n * n];
            let mut peak = f64::MIN;
            for (row, &gy) in axis.iter().enumerate() {
                for (col, &gx) in axis.iter().enumerate() {
                    let v = (-((gx - cx).powi(2) + (gy - cy).powi(2))
                        / (sigma * sigma))
                        .exp();
                    peak = peak.max(v);
                    vals[row * n + col] = v;
                }
            }

            RgbImage::from_fn(BLOB_EDGE, BLOB_EDGE, |x, y| {
                let v = vals[y as usize * n + x as usize] / peak * 0.9 + 0.1;
                let b = (v * 255.0) as u8;
                Rgb([b, b, b])
            })
        })
        .collect()
}

/// Ground truth for the two-frame short movie: the second and the last
/// frame of the full reference movie.
pub fn short_movie_frames() -> Vec<RgbImage> {
    let all = moving_blob_frames();
    vec![all[1].clone(), all[MOVIE_FRAMES - 1].clone()]
}

/// A forced IDR is inserted this often so that losses after mid-stream
/// corruption stay bounded to one group of pictures.
const IDR_INTERVAL: usize = 8;

/// Bits per second granted to the reference encoder. For a 32×32 movie
/// this exceeds the raw I420 rate, so quality-mode rate control drives
/// the quantizer to the floor and recompression error stays small.
const REFERENCE_BITRATE_BPS: u32 = 1_000_000;

/// Encode ground-truth frames into a raw Annex-B H.264 stream.
///
/// Frame skipping is disabled and the bitrate generous, so every input
/// frame appears in the stream and the recompression error stays well
/// inside the comparison tolerances.
pub fn encode_movie(frames: &[RgbImage]) -> Result<Vec<u8>> {
    let config = EncoderConfig::new()
        .max_frame_rate(30.0)
        .set_bitrate_bps(REFERENCE_BITRATE_BPS)
        .rate_control_mode(RateControlMode::Quality)
        .enable_skip_frame(false);
    let api = OpenH264API::from_source();
    let mut encoder =
        Encoder::with_api_config(api, config).context("failed to create encoder")?;

    let mut stream = Vec::new();
    for (i, frame) in frames.iter().enumerate() {
        if i % IDR_INTERVAL == 0 {
            encoder.force_intra_frame();
        }

        let (width, height) = frame.dimensions();
        let (w, h) = (width as usize, height as usize);
        let i420 = rgb_to_i420(frame);
        let (y_plane, uv_planes) = i420.split_at(w * h);
        let (u_plane, v_plane) = uv_planes.split_at(w * h / 4);
        let yuv = YUVSlices::new((y_plane, u_plane, v_plane), (w, h), (w, w / 2, w / 2));

        let bitstream = encoder.encode(&yuv).context("encode failed")?;
        stream.extend(bitstream.to_vec());
    }

    info!(
        frames = frames.len(),
        bytes = stream.len(),
        "reference movie encoded"
    );
    Ok(stream)
}

/// Convert RGB pixel data to I420 (YUV 4:2:0 planar). Width and height
/// must be even.
fn rgb_to_i420(img: &RgbImage) -> Vec<u8> {
    let w = img.width() as usize;
    let h = img.height() as usize;
    let y_size = w * h;
    let uv_size = (w / 2) * (h / 2);
    let mut yuv = vec![0u8; y_size + uv_size * 2];

    let (y_plane, uv_planes) = yuv.split_at_mut(y_size);
    let (u_plane, v_plane) = uv_planes.split_at_mut(uv_size);

    for row in 0..h {
        for col in 0..w {
            let Rgb([r, g, b]) = *img.get_pixel(col as u32, row as u32);
            let (r, g, b) = (r as f32, g as f32, b as f32);
            y_plane[row * w + col] = (0.299 * r + 0.587 * g + 0.114 * b)
                .round()
                .clamp(0.0, 255.0) as u8;
        }
    }

    // Subsample U and V over 2x2 blocks.
    for row in (0..h).step_by(2) {
        for col in (0..w).step_by(2) {
            let mut r_sum = 0.0f32;
            let mut g_sum = 0.0f32;
            let mut b_sum = 0.0f32;
            for dr in 0..2 {
                for dc in 0..2 {
                    let Rgb([r, g, b]) =
                        *img.get_pixel((col + dc) as u32, (row + dr) as u32);
                    r_sum += r as f32;
                    g_sum += g as f32;
                    b_sum += b as f32;
                }
            }
            let r = r_sum / 4.0;
            let g = g_sum / 4.0;
            let b = b_sum / 4.0;

            let uv_idx = (row / 2) * (w / 2) + (col / 2);
            u_plane[uv_idx] = (-0.169 * r - 0.331 * g + 0.500 * b + 128.0)
                .round()
                .clamp(0.0, 255.0) as u8;
            v_plane[uv_idx] = (0.500 * r - 0.419 * g - 0.081 * b + 128.0)
                .round()
                .clamp(0.0, 255.0) as u8;
        }
    }

    yuv
}

/// Mean squared error and maximum absolute per-channel difference
/// between a decoded frame and its ground truth.
pub fn frame_error(expected: &RgbImage, decoded: &Frame) -> (f64, u8) {
    let img = decoded.to_image();
    assert_eq!(
        img.dimensions(),
        expected.dimensions(),
        "decoded frame geometry differs from ground truth"
    );

    let mut sum_sq = 0f64;
    let mut max_abs = 0u8;
    for (&a, &b) in expected.as_raw().iter().zip(img.as_raw()) {
        let d = (a as i32 - b as i32).unsigned_abs() as u8;
        sum_sq += d as f64 * d as f64;
        max_abs = max_abs.max(d);
    }
    (sum_sq / expected.as_raw().len() as f64, max_abs)
}

/// Assert that decoded frames match ground truth within the lossy
/// recompression tolerances: per-frame MSE below 10 and per-channel
/// absolute difference at most 40.
pub fn assert_frames_match(expected: &[RgbImage], decoded: &[Frame]) {
    assert_eq!(
        expected.len(),
        decoded.len(),
        "frame count: decoded {} vs expected {}",
        decoded.len(),
        expected.len()
    );
    for (i, (exp, dec)) in expected.iter().zip(decoded).enumerate() {
        let (mse, max_abs) = frame_error(exp, dec);
        assert!(max_abs <= 40, "frame {i}: max channel diff {max_abs}");
        assert!(mse < 10.0, "frame {i}: mse {mse}");
    }
}

/// Padding byte the mock engine writes into the stride area of its
/// frames, so tests can prove padding never leaks into extracted pixels.
pub const PADDING_BYTE: u8 = 0xEE;

/// Separator byte of the mock engine's toy framing.
pub const UNIT_SEPARATOR: u8 = b'|';

/// Deterministic stand-in codec engine for session-level tests.
///
/// Speaks a toy framing where units are separated by `|`:
///
/// - `C` followed by width, height and rowsize bytes sets the frame
///   geometry;
/// - `F` units decode to one picture each once the geometry is known,
///   with the unit payload cycled through the visible pixels and
///   [`PADDING_BYTE`] in the stride area;
/// - `D` units decode to a picture that is held back until flush;
/// - anything else is garbage and is skipped.
///
/// Geometry learned from a `C` unit persists for the engine's lifetime.
/// A stream whose `C` unit arrives after its pictures therefore yields
/// nothing on the first pass and everything on a second pass over the
/// same bytes, reproducing the bootstrap behavior of the real engine.
pub struct MockEngine {
    pending: Vec<u8>,
    geometry: Option<(u32, u32, usize)>,
    held: Vec<Frame>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            geometry: None,
            held: Vec::new(),
        }
    }

    fn decode_unit(&mut self, unit: &[u8]) -> Result<Option<Frame>> {
        match unit.first().copied() {
            Some(b'C') if unit.len() >= 4 => {
                self.geometry = Some((unit[1] as u32, unit[2] as u32, unit[3] as usize));
                Ok(None)
            }
            Some(b'F') | Some(b'D') => {
                let Some((width, height, rowsize)) = self.geometry else {
                    return Ok(None);
                };
                let payload = &unit[1..];
                let visible = width as usize * 3;
                let mut data = vec![0u8; height as usize * rowsize];
                for (row_idx, row) in data.chunks_exact_mut(rowsize).enumerate() {
                    for (col, byte) in row.iter_mut().enumerate() {
                        *byte = if col < visible && !payload.is_empty() {
                            payload[(row_idx * visible + col) % payload.len()]
                        } else if col < visible {
                            0
                        } else {
                            PADDING_BYTE
                        };
                    }
                }
                let frame = Frame::from_raw(width, height, rowsize, data)?;
                if unit[0] == b'D' {
                    self.held.push(frame);
                    Ok(None)
                } else {
                    Ok(Some(frame))
                }
            }
            _ => Ok(None),
        }
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecEngine for MockEngine {
    fn decode_step(&mut self, data: &[u8]) -> Result<(Option<Frame>, usize)> {
        let carried = self.pending.len();
        let mut hay = Vec::with_capacity(carried + data.len());
        hay.extend_from_slice(&self.pending);
        hay.extend_from_slice(data);

        match hay.iter().position(|&b| b == UNIT_SEPARATOR) {
            Some(end) => {
                let unit = hay[..end].to_vec();
                self.pending.clear();
                let frame = self.decode_unit(&unit)?;
                Ok((frame, end + 1 - carried))
            }
            None => {
                self.pending = hay;
                Ok((None, data.len()))
            }
        }
    }

    fn flush(&mut self) -> Result<Vec<Frame>> {
        let mut frames = Vec::new();
        let tail = std::mem::take(&mut self.pending);
        if !tail.is_empty() {
            if let Some(frame) = self.decode_unit(&tail)? {
                frames.push(frame);
            }
        }
        frames.append(&mut self.held);
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_frames_are_deterministic_grayscale() {
        let a = moving_blob_frames();
        let b = moving_blob_frames();
        assert_eq!(a.len(), MOVIE_FRAMES);
        assert_eq!(a[0].dimensions(), (BLOB_EDGE, BLOB_EDGE));
        assert_eq!(a[17].as_raw(), b[17].as_raw());

        for px in a[100].pixels() {
            let Rgb([r, g, b]) = *px;
            assert_eq!(r, g);
            assert_eq!(g, b);
        }
    }

    #[test]
    fn blob_moves_between_frames() {
        let frames = moving_blob_frames();
        assert_ne!(frames[0].as_raw(), frames[MOVIE_FRAMES / 2].as_raw());
    }

    #[test]
    fn short_movie_has_two_frames() {
        let frames = short_movie_frames();
        assert_eq!(frames.len(), 2);
        assert_ne!(frames[0].as_raw(), frames[1].as_raw());
    }

    #[test]
    fn frame_error_is_zero_for_identical_pixels() {
        let img = moving_blob_frames().remove(0);
        let dense: Vec<u8> = img.as_raw().clone();
        let frame = Frame::from_raw(BLOB_EDGE, BLOB_EDGE, BLOB_EDGE as usize * 3, dense)
            .unwrap();
        let (mse, max_abs) = frame_error(&img, &frame);
        assert_eq!(mse, 0.0);
        assert_eq!(max_abs, 0);
    }

    // Frames deep into the zig-zag carry the most motion, which is where
    // encoder quality shortfalls show up first. The recompression must
    // stay inside the tolerances assert_frames_match publishes.
    #[test]
    fn reference_encoding_meets_comparison_tolerances() {
        let frames = moving_blob_frames();
        let window = &frames[60..76];
        let stream = encode_movie(window).unwrap();

        let mut session = crate::session::DecoderSession::new().unwrap();
        let options = crate::stream::StreamOptions {
            chunk_size: None,
            allow_retry: false,
            flush: true,
        };
        let decoded = crate::stream::decode_stream(&mut session, &stream, &options).unwrap();
        assert_frames_match(window, &decoded);
    }

    #[test]
    fn mock_engine_skips_garbage_units() {
        let mut engine = MockEngine::new();
        let stream = b"C\x02\x02\x06|junk!|Fab|";
        let mut rest: &[u8] = stream;
        let mut frames = Vec::new();
        while !rest.is_empty() {
            let (frame, consumed) = engine.decode_step(rest).unwrap();
            frames.extend(frame);
            rest = &rest[consumed..];
        }
        assert_eq!(frames.len(), 1);
    }
}
