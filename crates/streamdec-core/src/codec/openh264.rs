//! Codec engine backed by Cisco's OpenH264 decoder.

use std::borrow::Cow;

use anyhow::{Context, Result};
use openh264::decoder::{DecodedYUV, Decoder, DecoderConfig};
use openh264::formats::YUVSource;
use openh264::OpenH264API;
use tracing::{debug, trace, warn};

use super::{annexb, CodecEngine};
use crate::frame::{Frame, BYTES_PER_PIXEL};

/// H.264 engine wrapping an OpenH264 decoder instance.
///
/// `pending` is the carry-over buffer: the residual bytes of the most
/// recent partial NAL unit (or at most a couple of zero bytes that could
/// begin a start code, while skipping garbage or after a unit boundary
/// landed inside the carried bytes). It never holds a complete
/// unit and never any byte past the first unit's terminating boundary,
/// which is what lets `decode_step` stop consuming exactly at access-unit
/// boundaries and report an honest consumed-byte count.
pub struct OpenH264Engine {
    decoder: Decoder,
    pending: Vec<u8>,
}

impl OpenH264Engine {
    pub fn new() -> Result<Self> {
        let api = OpenH264API::from_source();
        let decoder = Decoder::with_api_config(api, DecoderConfig::new())
            .context("failed to create OpenH264 decoder")?;
        debug!("openh264 engine created");
        Ok(Self {
            decoder,
            pending: Vec::new(),
        })
    }

    /// Hand one complete NAL unit (start code included) to the decoder.
    ///
    /// Backend decode errors are absorbed with a warning: a unit mangled
    /// by mid-stream garbage costs the frames that depended on it, never
    /// the whole session. The decoder re-acquires sync at the next intra
    /// picture. Layout violations in what the backend hands back are not
    /// absorbed; they mean the engine contract itself is broken.
    fn decode_unit(&mut self, unit: &[u8]) -> Result<Option<Frame>> {
        match self.decoder.decode(unit) {
            Ok(Some(yuv)) => {
                let frame = frame_from_yuv(&yuv)?;
                trace!(
                    width = frame.width(),
                    height = frame.height(),
                    unit_len = unit.len(),
                    "picture completed"
                );
                Ok(Some(frame))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(unit_len = unit.len(), error = %e, "dropping undecodable unit");
                Ok(None)
            }
        }
    }
}

impl CodecEngine for OpenH264Engine {
    fn decode_step(&mut self, data: &[u8]) -> Result<(Option<Frame>, usize)> {
        let carried = self.pending.len();
        let hay: Cow<'_, [u8]> = if carried == 0 {
            Cow::Borrowed(data)
        } else {
            let mut joined = Vec::with_capacity(carried + data.len());
            joined.extend_from_slice(&self.pending);
            joined.extend_from_slice(data);
            Cow::Owned(joined)
        };

        let Some(start) = annexb::find_start_code(&hay, 0) else {
            // Nothing but garbage so far. Keep a possible start-code
            // prefix at the tail so a code split across tiny chunks is
            // not lost.
            let keep = annexb::trailing_prefix_len(&hay);
            self.pending = hay[hay.len() - keep..].to_vec();
            return Ok((None, data.len()));
        };

        match annexb::find_start_code(&hay, start + annexb::START_CODE_LEN) {
            Some(end) => {
                // hay[start..end] is one complete unit. Everything at and
                // past `end` stays with the caller.
                let frame = self.decode_unit(&hay[start..end])?;
                if end < carried {
                    // The terminating start code begins inside the carried
                    // bytes (a partial unit ending in zero bytes, completed
                    // by the chunk's leading 0x01). Those bytes were already
                    // counted consumed on an earlier call, so they go back
                    // into the carry-over and none of this chunk is consumed.
                    self.pending = hay[end..carried].to_vec();
                    Ok((frame, 0))
                } else {
                    self.pending.clear();
                    Ok((frame, end - carried))
                }
            }
            None => {
                self.pending = hay[start..].to_vec();
                Ok((None, data.len()))
            }
        }
    }

    fn flush(&mut self) -> Result<Vec<Frame>> {
        let mut frames = Vec::new();

        // The last unit of a stream has no terminating start code, so it
        // is still sitting in the carry-over buffer.
        let tail = std::mem::take(&mut self.pending);
        if annexb::find_start_code(&tail, 0).is_some() {
            if let Some(frame) = self.decode_unit(&tail)? {
                frames.push(frame);
            }
        }

        for yuv in self
            .decoder
            .flush_remaining()
            .context("openh264 flush failed")?
        {
            frames.push(frame_from_yuv(&yuv)?);
        }

        debug!(flushed = frames.len(), "engine flushed");
        Ok(frames)
    }
}

/// Copy a decoded YUV picture out of the decoder as an owned RGB frame.
fn frame_from_yuv(yuv: &DecodedYUV<'_>) -> Result<Frame> {
    let (width, height) = yuv.dimensions();
    let mut rgb = vec![0u8; width * height * BYTES_PER_PIXEL];
    yuv.write_rgb8(&mut rgb);
    Frame::from_raw(
        width as u32,
        height as u32,
        width * BYTES_PER_PIXEL,
        rgb,
    )
    .map_err(Into::into)
}
