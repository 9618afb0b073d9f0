pub mod annexb;
pub mod openh264;

use anyhow::Result;

use crate::frame::Frame;

/// Interface every codec engine must provide.
///
/// An engine is a stateful black box built once per session. It buffers
/// partial input internally (the carry-over), recognizes access-unit
/// boundaries, and turns completed units into [`Frame`]s. How it parses
/// the bitstream is its own business; sessions only do byte accounting
/// on top of this surface.
pub trait CodecEngine {
    /// Feed bytes, stopping at the first access-unit boundary.
    ///
    /// Returns the picture completed by this step, if any, and the number
    /// of bytes consumed from the head of `data` (at most `data.len()`).
    /// Consuming zero bytes is legal when the step completed a unit that
    /// was already fully buffered from earlier calls.
    ///
    /// Undecodable units caused by stream corruption are absorbed: the
    /// engine skips them and resynchronizes on the next unit boundary,
    /// which costs frames but never the session.
    fn decode_step(&mut self, data: &[u8]) -> Result<(Option<Frame>, usize)>;

    /// Release every picture held back for reference management, with no
    /// further input expected. Returns an empty vector when nothing is
    /// buffered; that is not an error.
    fn flush(&mut self) -> Result<Vec<Frame>>;
}
