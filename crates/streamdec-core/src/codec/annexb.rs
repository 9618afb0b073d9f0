//! Annex-B byte-stream framing: start-code scanning for NAL unit
//! boundaries.
//!
//! A NAL unit begins at a `00 00 01` start code and ends where the next
//! start code begins. Bytes before the first start code are garbage and
//! are skipped, which is also how decoding resynchronizes after a span
//! of mid-stream corruption.

/// Byte length of the short start code this scanner keys on. Four-byte
/// `00 00 00 01` codes are matched at their trailing three bytes; the
/// leading zero ends up as a harmless trailing byte of the previous unit.
pub const START_CODE_LEN: usize = 3;

/// Position of the first `00 00 01` start code at or after `from`, if any.
pub fn find_start_code(data: &[u8], from: usize) -> Option<usize> {
    if data.len() < START_CODE_LEN {
        return None;
    }
    (from..=data.len() - START_CODE_LEN)
        .find(|&i| data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1)
}

/// Number of trailing bytes that could still turn out to be the beginning
/// of a start code once more input arrives.
///
/// When a chunk of garbage is discarded, its tail must be retained if it
/// ends in zero bytes: a start code split across two tiny chunks would
/// otherwise be lost, and with it the resynchronization point.
pub fn trailing_prefix_len(data: &[u8]) -> usize {
    let n = data.len();
    if n >= 2 && data[n - 2] == 0 && data[n - 1] == 0 {
        2
    } else if n >= 1 && data[n - 1] == 0 {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_start_code_at_offset() {
        let data = [0xAA, 0x00, 0x00, 0x01, 0x65, 0x00, 0x00, 0x01, 0x41];
        assert_eq!(find_start_code(&data, 0), Some(1));
        assert_eq!(find_start_code(&data, 2), Some(5));
        assert_eq!(find_start_code(&data, 6), None);
    }

    #[test]
    fn no_start_code_in_short_or_garbage_input() {
        assert_eq!(find_start_code(&[], 0), None);
        assert_eq!(find_start_code(&[0x00, 0x00], 0), None);
        assert_eq!(find_start_code(&[0xFF; 16], 0), None);
    }

    #[test]
    fn four_byte_code_matches_at_trailing_three_bytes() {
        let data = [0x00, 0x00, 0x00, 0x01, 0x67];
        assert_eq!(find_start_code(&data, 0), Some(1));
    }

    #[test]
    fn trailing_prefix_counts_zero_tail() {
        assert_eq!(trailing_prefix_len(&[]), 0);
        assert_eq!(trailing_prefix_len(&[0x12, 0x34]), 0);
        assert_eq!(trailing_prefix_len(&[0x12, 0x00]), 1);
        assert_eq!(trailing_prefix_len(&[0x00, 0x00]), 2);
        assert_eq!(trailing_prefix_len(&[0x00, 0x00, 0x00]), 2);
    }
}
