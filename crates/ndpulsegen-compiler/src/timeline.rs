use std::collections::BTreeMap;

use ndpulsegen_wire::{ChannelState, InstructionFlags, NUM_CHANNELS};

/// Instruction flags as a partial update: `None` leaves a flag as it was.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateFlags {
    pub stop_and_wait: Option<bool>,
    pub hardware_trig_out: Option<bool>,
    pub notify_computer: Option<bool>,
    pub powerline_sync: Option<bool>,
}

impl UpdateFlags {
    /// No flag supplied.
    pub const NONE: Self = Self {
        stop_and_wait: None,
        hardware_trig_out: None,
        notify_computer: None,
        powerline_sync: None,
    };

    pub fn with_stop_and_wait(mut self, value: bool) -> Self {
        self.stop_and_wait = Some(value);
        self
    }

    pub fn with_hardware_trig_out(mut self, value: bool) -> Self {
        self.hardware_trig_out = Some(value);
        self
    }

    pub fn with_notify_computer(mut self, value: bool) -> Self {
        self.notify_computer = Some(value);
        self
    }

    pub fn with_powerline_sync(mut self, value: bool) -> Self {
        self.powerline_sync = Some(value);
        self
    }

    /// Returns true if no flag is supplied.
    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    /// Overwrite every flag that `other` supplies.
    pub fn merge(&mut self, other: UpdateFlags) {
        self.stop_and_wait = other.stop_and_wait.or(self.stop_and_wait);
        self.hardware_trig_out = other.hardware_trig_out.or(self.hardware_trig_out);
        self.notify_computer = other.notify_computer.or(self.notify_computer);
        self.powerline_sync = other.powerline_sync.or(self.powerline_sync);
    }

    /// Flags as written to an instruction; unset flags are off.
    pub fn resolve(self) -> InstructionFlags {
        InstructionFlags {
            stop_and_wait: self.stop_and_wait.unwrap_or(false),
            hardware_trig_out: self.hardware_trig_out.unwrap_or(false),
            notify_computer: self.notify_computer.unwrap_or(false),
            powerline_sync: self.powerline_sync.unwrap_or(false),
        }
    }
}

/// A branch: jump to the instruction at `target` cycles, `counter` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GotoSpec {
    pub target: u64,
    pub counter: u32,
}

/// Everything scheduled at one instant of the timeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimelineEvent {
    overrides: BTreeMap<usize, bool>,
    flags: UpdateFlags,
    goto: Option<GotoSpec>,
}

impl TimelineEvent {
    /// An event that sets every channel to `state`.
    pub fn snapshot(state: ChannelState) -> Self {
        Self {
            overrides: state.levels().into_iter().enumerate().collect(),
            ..Self::default()
        }
    }

    /// Channels changed at this instant.
    pub fn overrides(&self) -> &BTreeMap<usize, bool> {
        &self.overrides
    }

    /// Flags supplied at this instant.
    pub fn flags(&self) -> UpdateFlags {
        self.flags
    }

    /// Branch taken at the end of this instant's instruction.
    pub fn goto(&self) -> Option<GotoSpec> {
        self.goto
    }

    /// Returns true if the event changes nothing.
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty() && self.flags.is_empty() && self.goto.is_none()
    }

    pub(crate) fn merge_overrides(&mut self, overrides: &[(usize, bool)]) {
        for &(channel, level) in overrides {
            debug_assert!(channel < NUM_CHANNELS);
            self.overrides.insert(channel, level);
        }
    }

    pub(crate) fn merge_flags(&mut self, flags: UpdateFlags) {
        self.flags.merge(flags);
    }

    pub(crate) fn set_goto(&mut self, goto: GotoSpec) {
        self.goto = Some(goto);
    }
}
