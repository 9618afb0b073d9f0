//! Streaming decoder sessions for raw H.264 (Annex-B) byte streams.
//!
//! Bytes arrive in arbitrarily sized chunks, as they would from a file,
//! a socket, or a producer thread. A [`session::DecoderSession`] forwards
//! them to a codec engine and hands back every picture the engine manages
//! to complete, in decode order, as soon as it completes. Partial input is
//! carried over between calls, so any positive chunk size works, down to a
//! few bytes per call.

pub mod codec;
pub mod error;
pub mod frame;
pub mod session;
pub mod stream;
pub mod testing;
