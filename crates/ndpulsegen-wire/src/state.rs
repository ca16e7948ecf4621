use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};

/// Number of TTL output channels.
pub const NUM_CHANNELS: usize = 24;

/// Output level of all 24 channels at one instant.
///
/// Stored as the low 24 bits of a `u32`, bit `n` is channel `n`.
/// Serializes as an array of 24 booleans indexed by channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[bool; NUM_CHANNELS]", into = "[bool; NUM_CHANNELS]")]
pub struct ChannelState(u32);

impl ChannelState {
    /// Every channel low.
    pub const ALL_LOW: Self = Self(0);

    /// Every channel high.
    pub const ALL_HIGH: Self = Self(Self::MASK);

    /// Bits that carry channel levels.
    pub const MASK: u32 = (1 << NUM_CHANNELS) - 1;

    /// Build a state from raw bits, rejecting bits above channel 23.
    pub fn from_bits(bits: u32) -> CodecResult<Self> {
        if bits & !Self::MASK != 0 {
            return Err(CodecError::FieldOutOfRange {
                field: "state",
                value: u64::from(bits),
                max: u64::from(Self::MASK),
            });
        }
        Ok(Self(bits))
    }

    /// Build a state from raw bits, ignoring bits above channel 23.
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::MASK)
    }

    /// Raw bits, channel `n` at bit `n`.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Level of one channel. Channels outside the range read as low.
    pub fn get(self, channel: usize) -> bool {
        channel < NUM_CHANNELS && self.0 & (1 << channel) != 0
    }

    /// Set the level of one channel.
    pub fn set(&mut self, channel: usize, level: bool) -> CodecResult<()> {
        if channel >= NUM_CHANNELS {
            return Err(CodecError::FieldOutOfRange {
                field: "channel",
                value: channel as u64,
                max: (NUM_CHANNELS - 1) as u64,
            });
        }
        if level {
            self.0 |= 1 << channel;
        } else {
            self.0 &= !(1 << channel);
        }
        Ok(())
    }

    /// Levels as an array indexed by channel.
    pub fn levels(self) -> [bool; NUM_CHANNELS] {
        std::array::from_fn(|channel| self.get(channel))
    }
}

impl From<[bool; NUM_CHANNELS]> for ChannelState {
    fn from(levels: [bool; NUM_CHANNELS]) -> Self {
        let bits = levels
            .iter()
            .enumerate()
            .filter(|(_, &level)| level)
            .fold(0u32, |bits, (channel, _)| bits | (1 << channel));
        Self(bits)
    }
}

impl From<ChannelState> for [bool; NUM_CHANNELS] {
    fn from(state: ChannelState) -> Self {
        state.levels()
    }
}

impl fmt::Display for ChannelState {
    /// Channel 0 first, one `0`/`1` per channel.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for level in self.levels() {
            f.write_str(if level { "1" } else { "0" })?;
        }
        Ok(())
    }
}
