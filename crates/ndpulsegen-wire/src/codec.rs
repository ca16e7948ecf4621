//! Field-level encoding helpers shared by commands and telemetry.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{CodecError, CodecResult};
use crate::state::ChannelState;

/// Largest value of a 48-bit field (durations, delays).
pub const MAX_U48: u64 = (1 << 48) - 1;

/// Width in bytes of a channel state field.
pub const STATE_WIDTH: usize = 3;

/// Width in bytes of a 48-bit field.
pub const U48_WIDTH: usize = 6;

pub(crate) fn check_range(field: &'static str, value: u64, max: u64) -> CodecResult<()> {
    if value > max {
        return Err(CodecError::FieldOutOfRange { field, value, max });
    }
    Ok(())
}

pub(crate) fn expect_len(what: &'static str, buf: &[u8], expected: usize) -> CodecResult<()> {
    if buf.len() != expected {
        return Err(CodecError::InvalidLength {
            what,
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

pub(crate) fn put_u48(dst: &mut BytesMut, field: &'static str, value: u64) -> CodecResult<()> {
    check_range(field, value, MAX_U48)?;
    dst.put_uint_le(value, U48_WIDTH);
    Ok(())
}

pub(crate) fn get_u48(src: &mut &[u8]) -> u64 {
    src.get_uint_le(U48_WIDTH)
}

pub(crate) fn put_state(dst: &mut BytesMut, state: ChannelState) {
    dst.put_uint_le(u64::from(state.bits()), STATE_WIDTH);
}

pub(crate) fn get_state(src: &mut &[u8]) -> ChannelState {
    ChannelState::from_bits_truncate(src.get_uint_le(STATE_WIDTH) as u32)
}

/// Pack booleans into a byte, first element at bit 0.
pub(crate) fn pack_bits(bits: &[bool]) -> u8 {
    bits.iter()
        .enumerate()
        .fold(0u8, |byte, (n, &set)| if set { byte | (1 << n) } else { byte })
}

pub(crate) fn bit(byte: u8, n: u8) -> bool {
    byte & (1 << n) != 0
}
