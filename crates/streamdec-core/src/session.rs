//! Streaming decode session: byte accounting over a codec engine.

use anyhow::{bail, Result};
use tracing::{debug, trace};

use crate::codec::openh264::OpenH264Engine;
use crate::codec::CodecEngine;
use crate::frame::Frame;

/// A streaming decode session over one codec engine.
///
/// The session owns its engine and carry-over state exclusively and
/// shares nothing with other sessions, so independent sessions can decode
/// on independent threads with no coordination. A single session has no
/// internal locking: calling into it from two threads at once requires
/// external mutual exclusion.
///
/// Every operation is a plain blocking call bounded by the size of the
/// supplied chunk; callers cancel by simply not feeding further chunks.
pub struct DecoderSession<E = OpenH264Engine> {
    engine: E,
}

impl DecoderSession<OpenH264Engine> {
    /// Session backed by the bundled OpenH264 engine.
    pub fn new() -> Result<Self> {
        Ok(Self {
            engine: OpenH264Engine::new()?,
        })
    }
}

impl<E: CodecEngine> DecoderSession<E> {
    /// Session over a caller-provided engine.
    pub fn with_engine(engine: E) -> Self {
        Self { engine }
    }

    /// Feed a chunk and collect every picture it completes, in decode
    /// order.
    ///
    /// An empty result means the engine needs more data; several frames
    /// at once are normal when one chunk happens to close several access
    /// units. A frame may also surface on a later call than the one whose
    /// bytes completed it, because the engine holds pictures back for
    /// reference management; [`flush`](Self::flush) resolves that at end
    /// of stream.
    pub fn decode(&mut self, chunk: &[u8]) -> Result<Vec<Frame>> {
        let mut frames = Vec::new();
        let mut rest = chunk;
        // One stalled iteration is allowed: a step may complete a unit
        // that was already fully buffered and consume nothing. Two in a
        // row means the engine is wedged.
        let mut made_progress = true;
        while !rest.is_empty() {
            let (frame, consumed) = self.engine.decode_step(rest)?;
            let got_frame = frame.is_some();
            if let Some(frame) = frame {
                frames.push(frame);
            }
            if !got_frame && consumed == 0 && !made_progress {
                bail!("cannot decode any more data ({} bytes remaining)", rest.len());
            }
            made_progress = consumed > 0;
            rest = &rest[consumed..];
        }
        trace!(
            chunk_len = chunk.len(),
            frames = frames.len(),
            "chunk decoded"
        );
        Ok(frames)
    }

    /// Single-step variant of [`decode`](Self::decode): at most one
    /// picture per call, plus the number of bytes consumed from the head
    /// of `chunk`.
    ///
    /// Callers wanting per-frame backpressure (render one picture before
    /// accepting more input) re-offer `chunk[consumed..]` until the chunk
    /// is exhausted; one bulk feed can hide more than one completed
    /// picture. Driving a stream this way yields exactly the frames
    /// [`decode`](Self::decode) would, at the cost of many small engine
    /// calls instead of one bulk pass.
    pub fn decode_frame(&mut self, chunk: &[u8]) -> Result<(Option<Frame>, usize)> {
        self.engine.decode_step(chunk)
    }

    /// Drain the pictures the engine is holding back for reference
    /// management, with no further input. Returns an empty vector when
    /// nothing is buffered.
    pub fn flush(&mut self) -> Result<Vec<Frame>> {
        let frames = self.engine.flush()?;
        debug!(frames = frames.len(), "session flushed");
        Ok(frames)
    }
}
