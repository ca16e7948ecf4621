use std::time::Duration;

use crate::error::{CompilerError, Result};

/// Length of one device clock cycle in nanoseconds.
pub const CLOCK_PERIOD_NS: u64 = 10;

const CLOCK_PERIOD_S: f64 = CLOCK_PERIOD_NS as f64 * 1e-9;

/// A point in time or a duration, in clock cycles or seconds.
///
/// Seconds are converted to cycles by rounding to the nearest cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Time {
    Cycles(u64),
    Seconds(f64),
}

impl Time {
    /// A time in clock cycles.
    pub const fn cycles(cycles: u64) -> Self {
        Self::Cycles(cycles)
    }

    /// A time in seconds.
    pub const fn seconds(seconds: f64) -> Self {
        Self::Seconds(seconds)
    }

    /// Convert to clock cycles.
    pub fn to_cycles(self) -> Result<u64> {
        match self {
            Self::Cycles(cycles) => Ok(cycles),
            Self::Seconds(seconds) => {
                let cycles = (seconds / CLOCK_PERIOD_S).round();
                if !cycles.is_finite() || cycles < 0.0 || cycles >= u64::MAX as f64 {
                    return Err(CompilerError::InvalidTime(seconds));
                }
                Ok(cycles as u64)
            }
        }
    }
}

impl From<u64> for Time {
    fn from(cycles: u64) -> Self {
        Self::Cycles(cycles)
    }
}

impl From<u32> for Time {
    fn from(cycles: u32) -> Self {
        Self::Cycles(u64::from(cycles))
    }
}

/// Lets untyped integer literals stand for cycles. A negative value is
/// carried through and rejected by [`Time::to_cycles`].
impl From<i32> for Time {
    fn from(cycles: i32) -> Self {
        match u64::try_from(cycles) {
            Ok(cycles) => Self::Cycles(cycles),
            Err(_) => Self::Seconds(f64::from(cycles) * CLOCK_PERIOD_S),
        }
    }
}

impl From<Duration> for Time {
    /// Rounds to the nearest cycle, saturating at `u64::MAX` cycles.
    fn from(duration: Duration) -> Self {
        let period = u128::from(CLOCK_PERIOD_NS);
        let cycles = (duration.as_nanos() + period / 2) / period;
        Self::Cycles(u64::try_from(cycles).unwrap_or(u64::MAX))
    }
}
