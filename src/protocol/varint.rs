//! Unsigned LEB128 varints used for every length prefix.
//!
//! # Design Decisions
//! - Truncation and overflow are distinct errors: a truncated varint may
//!   complete once more bytes arrive, an overflowing one never will
//! - At most `MAX_VARINT_LEN` bytes are examined for a `u64`

use crate::protocol::types::WireError;

/// Maximum encoded length of a `u64` varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Decode a varint starting at `offset`.
///
/// Returns the value and the number of bytes consumed.
pub fn read_uvarint(buf: &[u8], offset: usize) -> Result<(u64, usize), WireError> {
    let data = buf.get(offset..).unwrap_or_default();
    if data.is_empty() {
        return Err(WireError::Incomplete);
    }

    let mut value: u64 = 0;
    let mut shift = 0u32;
    for (i, &byte) in data.iter().enumerate() {
        if i == MAX_VARINT_LEN {
            return Err(WireError::VarintOverflow);
        }
        if byte < 0x80 {
            // The tenth byte may only carry the final bit of a u64.
            if i == MAX_VARINT_LEN - 1 && byte > 1 {
                return Err(WireError::VarintOverflow);
            }
            return Ok((value | (u64::from(byte) << shift), i + 1));
        }
        value |= u64::from(byte & 0x7f) << shift;
        shift += 7;
    }

    if data.len() >= MAX_VARINT_LEN {
        Err(WireError::VarintOverflow)
    } else {
        Err(WireError::Incomplete)
    }
}

/// Append the varint encoding of `value` to `buf`.
pub fn append_uvarint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Number of bytes `append_uvarint` would write for `value`.
pub fn uvarint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}
