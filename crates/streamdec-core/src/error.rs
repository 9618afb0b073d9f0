use thiserror::Error;

/// The codec engine produced a buffer that does not obey the advertised
/// pixel layout. This indicates a broken engine, not bad input data, and
/// is never absorbed the way corrupted stream bytes are.
#[derive(Debug, Error)]
#[error(
    "frame layout contract violated: {reason} \
     (width={width}, height={height}, rowsize={rowsize}, data_len={data_len})"
)]
pub struct LayoutViolation {
    pub width: u32,
    pub height: u32,
    pub rowsize: usize,
    pub data_len: usize,
    pub reason: &'static str,
}
