//! Consumer-side helpers for driving a session over a complete buffer.

use anyhow::{bail, Result};
use tracing::{debug, warn};

use crate::codec::CodecEngine;
use crate::frame::Frame;
use crate::session::DecoderSession;

/// How to feed a buffer through a session.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Feed slices of this many bytes, or the whole buffer at once.
    pub chunk_size: Option<usize>,
    /// Re-feed the identical bytes once if a full pass produced nothing.
    ///
    /// On some streams the engine sees picture data before the parameter
    /// sets it needs and emits nothing on the first pass, while still
    /// caching those parameter sets. A second pass over the same bytes
    /// through the same session then decodes normally. This is a
    /// deliberate, observable property of how the engine bootstraps, not
    /// something to patch over silently.
    pub allow_retry: bool,
    /// Drain held-back pictures after the last chunk. Skipping the flush
    /// simulates an open-ended streaming consumer and under-reports the
    /// total frame count by a small latency margin.
    pub flush: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            chunk_size: None,
            allow_retry: false,
            flush: true,
        }
    }
}

/// Feed `data` through `session` according to `options`, collecting every
/// decoded frame in order.
pub fn decode_stream<E: CodecEngine>(
    session: &mut DecoderSession<E>,
    data: &[u8],
    options: &StreamOptions,
) -> Result<Vec<Frame>> {
    if options.chunk_size == Some(0) {
        bail!("chunk_size must be positive");
    }

    let frames = feed(session, data, options)?;
    if frames.is_empty() && options.allow_retry {
        warn!("first pass produced no frames, re-feeding once for engine bootstrap");
        return feed(session, data, options);
    }
    Ok(frames)
}

fn feed<E: CodecEngine>(
    session: &mut DecoderSession<E>,
    data: &[u8],
    options: &StreamOptions,
) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    match options.chunk_size {
        None => frames.extend(session.decode(data)?),
        Some(size) => {
            for chunk in data.chunks(size) {
                frames.extend(session.decode(chunk)?);
            }
        }
    }
    if options.flush {
        frames.extend(session.flush()?);
    }
    debug!(
        input_len = data.len(),
        chunk_size = ?options.chunk_size,
        frames = frames.len(),
        "buffer pass complete"
    );
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEngine;

    fn mock_session() -> DecoderSession<MockEngine> {
        DecoderSession::with_engine(MockEngine::new())
    }

    const CONFIG: &[u8] = &[b'C', 2, 2, 6, b'|'];

    #[test]
    fn whole_buffer_and_chunked_passes_agree() {
        let mut stream = CONFIG.to_vec();
        stream.extend_from_slice(b"Fa|Fb|Fc|Dheld|");

        let mut whole = mock_session();
        let expected =
            decode_stream(&mut whole, &stream, &StreamOptions::default()).unwrap();
        assert_eq!(expected.len(), 4);

        for chunk_size in [1, 2, 3, 7, 1024] {
            let mut chunked = mock_session();
            let options = StreamOptions {
                chunk_size: Some(chunk_size),
                ..StreamOptions::default()
            };
            let got = decode_stream(&mut chunked, &stream, &options).unwrap();
            assert_eq!(got.len(), expected.len(), "chunk_size {chunk_size}");
            for (a, b) in got.iter().zip(&expected) {
                assert_eq!(a.data(), b.data(), "chunk_size {chunk_size}");
            }
        }
    }

    #[test]
    fn skipping_flush_under_reports_held_frames() {
        let mut stream = CONFIG.to_vec();
        stream.extend_from_slice(b"Fa|Dheld|");

        let mut session = mock_session();
        let options = StreamOptions {
            flush: false,
            ..StreamOptions::default()
        };
        let frames = decode_stream(&mut session, &stream, &options).unwrap();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn retry_recovers_stream_with_late_parameter_unit() {
        // Geometry arrives after the pictures that need it: the first
        // pass learns the geometry but emits nothing.
        let mut stream = b"Fa|Fb|".to_vec();
        stream.extend_from_slice(CONFIG);

        let mut no_retry = mock_session();
        let frames =
            decode_stream(&mut no_retry, &stream, &StreamOptions::default()).unwrap();
        assert!(frames.is_empty());

        let mut with_retry = mock_session();
        let options = StreamOptions {
            allow_retry: true,
            ..StreamOptions::default()
        };
        let frames = decode_stream(&mut with_retry, &stream, &options).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data()[0], b'a');
        assert_eq!(frames[1].data()[0], b'b');
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let mut session = mock_session();
        let options = StreamOptions {
            chunk_size: Some(0),
            ..StreamOptions::default()
        };
        assert!(decode_stream(&mut session, b"Fa|", &options).is_err());
    }
}
