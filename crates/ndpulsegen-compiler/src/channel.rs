use std::fmt;
use std::str::FromStr;

use crate::compiler::Compiler;
use crate::error::{CompilerError, Result};
use crate::time::Time;
use crate::timeline::UpdateFlags;

/// Where a repeated pulse places its flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FlagsMode {
    /// Leading edge of the first repetition.
    #[default]
    Start,
    /// Leading edge of every repetition.
    Every,
    /// Trailing edge of the last repetition.
    End,
}

impl FlagsMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Every => "every",
            Self::End => "end",
        }
    }
}

impl fmt::Display for FlagsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlagsMode {
    type Err = CompilerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "start" => Ok(Self::Start),
            "every" => Ok(Self::Every),
            "end" => Ok(Self::End),
            other => Err(CompilerError::UnknownFlagsMode(other.to_string())),
        }
    }
}

/// Shape of a single or repeated pulse.
///
/// Each repetition holds the active level for `duration_first`, then the
/// idle level for `duration_second`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pulse {
    pub duration_first: Time,
    pub duration_second: Time,
    pub count: u32,
    pub flags_mode: FlagsMode,
}

impl Pulse {
    /// A single pulse of length `duration_first`.
    pub fn new(duration_first: impl Into<Time>) -> Self {
        Self {
            duration_first: duration_first.into(),
            duration_second: Time::Cycles(0),
            count: 1,
            flags_mode: FlagsMode::Start,
        }
    }

    pub fn idle(mut self, duration_second: impl Into<Time>) -> Self {
        self.duration_second = duration_second.into();
        self
    }

    pub fn repeat(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn flags_mode(mut self, mode: FlagsMode) -> Self {
        self.flags_mode = mode;
        self
    }
}

/// Handle for one output channel of a [`Compiler`].
///
/// Obtained from [`Compiler::channel`]; every method records updates in the
/// compiler it is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel {
    number: usize,
}

impl Channel {
    pub(crate) fn new(number: usize) -> Self {
        Self { number }
    }

    /// Channel index, 0..24.
    pub fn number(self) -> usize {
        self.number
    }

    /// Drive the channel high at `t`.
    pub fn high(self, compiler: &mut Compiler, t: impl Into<Time>, flags: UpdateFlags) -> Result<()> {
        self.set(compiler, t, true, flags)
    }

    /// Drive the channel low at `t`.
    pub fn low(self, compiler: &mut Compiler, t: impl Into<Time>, flags: UpdateFlags) -> Result<()> {
        self.set(compiler, t, false, flags)
    }

    /// Drive the channel to `level` at `t`.
    pub fn set(
        self,
        compiler: &mut Compiler,
        t: impl Into<Time>,
        level: bool,
        flags: UpdateFlags,
    ) -> Result<()> {
        compiler.add_update(t, [(self.number, level)], flags)
    }

    /// High for `duration_first`, low for `duration_second`, `count` times.
    ///
    /// Returns the cycles from `t` to the trailing edge of the last
    /// repetition. A count of 0 schedules nothing and returns 0.
    pub fn pulse_high(
        self,
        compiler: &mut Compiler,
        t: impl Into<Time>,
        pulse: Pulse,
        flags: UpdateFlags,
    ) -> Result<u64> {
        self.pulse(compiler, t.into(), pulse, true, flags)
    }

    /// Low for `duration_first`, high for `duration_second`, `count` times.
    pub fn pulse_low(
        self,
        compiler: &mut Compiler,
        t: impl Into<Time>,
        pulse: Pulse,
        flags: UpdateFlags,
    ) -> Result<u64> {
        self.pulse(compiler, t.into(), pulse, false, flags)
    }

    fn pulse(
        self,
        compiler: &mut Compiler,
        t: Time,
        pulse: Pulse,
        active: bool,
        flags: UpdateFlags,
    ) -> Result<u64> {
        if pulse.count == 0 {
            return Ok(0);
        }
        let start = t.to_cycles()?;
        let first = pulse.duration_first.to_cycles()?;
        let second = pulse.duration_second.to_cycles()?;
        if first == 0 {
            return Err(CompilerError::ZeroActiveDuration);
        }
        if pulse.count > 1 && second == 0 {
            return Err(CompilerError::ZeroIdleDuration { count: pulse.count });
        }

        let period = first.checked_add(second).ok_or(CompilerError::TimeOverflow)?;
        let last = u64::from(pulse.count - 1);
        let length = period
            .checked_mul(last)
            .and_then(|v| v.checked_add(first))
            .ok_or(CompilerError::TimeOverflow)?;
        start.checked_add(length).ok_or(CompilerError::TimeOverflow)?;

        let channel = [(self.number, active)];
        let idle = [(self.number, !active)];
        for rep in 0..=last {
            let lead = start + rep * period;
            let lead_flags = match pulse.flags_mode {
                FlagsMode::Start if rep == 0 => flags,
                FlagsMode::Every => flags,
                _ => UpdateFlags::NONE,
            };
            let trail_flags = match pulse.flags_mode {
                FlagsMode::End if rep == last => flags,
                _ => UpdateFlags::NONE,
            };
            compiler.update_at(lead, &channel, lead_flags);
            compiler.update_at(lead + first, &idle, trail_flags);
        }
        Ok(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notify() -> UpdateFlags {
        UpdateFlags::NONE.with_notify_computer(true)
    }

    fn edges(compiler: &Compiler, channel: usize) -> Vec<(u64, bool)> {
        compiler
            .timeline()
            .iter()
            .filter_map(|(&t, event)| event.overrides().get(&channel).map(|&level| (t, level)))
            .collect()
    }

    fn notified(compiler: &Compiler) -> Vec<u64> {
        compiler
            .timeline()
            .iter()
            .filter(|(_, event)| event.flags().notify_computer == Some(true))
            .map(|(&t, _)| t)
            .collect()
    }

    #[test]
    fn repeated_pulse_schedules_every_edge() {
        let mut compiler = Compiler::new();
        let ch = compiler.channel(0).unwrap();
        let pulse = Pulse::new(2u64).idle(3u64).repeat(3);

        let length = ch.pulse_high(&mut compiler, 10u64, pulse, UpdateFlags::NONE).unwrap();
        assert_eq!(length, 12);
        assert_eq!(
            edges(&compiler, 0),
            vec![
                (10, true),
                (12, false),
                (15, true),
                (17, false),
                (20, true),
                (22, false),
            ]
        );
    }

    #[test]
    fn pulse_low_inverts_levels() {
        let mut compiler = Compiler::new();
        let ch = compiler.channel_with_starting_state(4, true).unwrap();
        ch.pulse_low(&mut compiler, 1u64, Pulse::new(5u64), UpdateFlags::NONE)
            .unwrap();
        assert_eq!(edges(&compiler, 4), vec![(1, false), (6, true)]);
    }

    #[test]
    fn flags_follow_mode() {
        let pulse = Pulse::new(1u64).idle(1u64).repeat(3);
        let cases = [
            (FlagsMode::Start, vec![0]),
            (FlagsMode::Every, vec![0, 2, 4]),
            (FlagsMode::End, vec![5]),
        ];
        for (mode, expected) in cases {
            let mut compiler = Compiler::new();
            let ch = compiler.channel(1).unwrap();
            ch.pulse_high(&mut compiler, 0u64, pulse.flags_mode(mode), notify())
                .unwrap();
            assert_eq!(notified(&compiler), expected, "mode {mode}");
        }
    }

    #[test]
    fn zero_count_schedules_nothing() {
        let mut compiler = Compiler::new();
        let ch = compiler.channel(0).unwrap();
        let length = ch
            .pulse_high(&mut compiler, 0u64, Pulse::new(4u64).repeat(0), UpdateFlags::NONE)
            .unwrap();
        assert_eq!(length, 0);
        assert!(compiler.timeline().is_empty());
    }

    #[test]
    fn repeat_without_idle_is_rejected() {
        let mut compiler = Compiler::new();
        let ch = compiler.channel(0).unwrap();
        let err = ch
            .pulse_high(&mut compiler, 0u64, Pulse::new(4u64).repeat(2), UpdateFlags::NONE)
            .unwrap_err();
        assert_eq!(err, CompilerError::ZeroIdleDuration { count: 2 });
        assert!(compiler.timeline().is_empty());
    }

    #[test]
    fn zero_active_duration_is_rejected() {
        let mut compiler = Compiler::new();
        let ch = compiler.channel(0).unwrap();
        let err = ch
            .pulse_high(&mut compiler, 5u64, Pulse::new(0u64), notify())
            .unwrap_err();
        assert_eq!(err, CompilerError::ZeroActiveDuration);

        // Sub-cycle durations round to zero and are rejected the same way.
        let err = ch
            .pulse_low(&mut compiler, 5u64, Pulse::new(Time::seconds(4e-9)), UpdateFlags::NONE)
            .unwrap_err();
        assert_eq!(err, CompilerError::ZeroActiveDuration);
        assert!(compiler.timeline().is_empty());
    }

    #[test]
    fn overflowing_pulse_is_rejected_before_scheduling() {
        let mut compiler = Compiler::new();
        let ch = compiler.channel(0).unwrap();
        let pulse = Pulse::new(u64::MAX / 2).idle(u64::MAX / 2).repeat(3);
        assert_eq!(
            ch.pulse_high(&mut compiler, 0u64, pulse, UpdateFlags::NONE),
            Err(CompilerError::TimeOverflow)
        );
        assert!(compiler.timeline().is_empty());
    }

    #[test]
    fn high_and_low_merge_with_other_channels() {
        let mut compiler = Compiler::new();
        let a = compiler.channel(0).unwrap();
        let b = compiler.channel(1).unwrap();
        a.high(&mut compiler, 5u64, UpdateFlags::NONE).unwrap();
        b.low(&mut compiler, 5u64, notify()).unwrap();

        let event = &compiler.timeline()[&5];
        assert_eq!(event.overrides().get(&0), Some(&true));
        assert_eq!(event.overrides().get(&1), Some(&false));
        assert_eq!(event.flags().notify_computer, Some(true));
    }

    #[test]
    fn flags_mode_parses() {
        assert_eq!("every".parse::<FlagsMode>().unwrap(), FlagsMode::Every);
        assert_eq!(
            "sometimes".parse::<FlagsMode>(),
            Err(CompilerError::UnknownFlagsMode("sometimes".to_string()))
        );
    }
}
