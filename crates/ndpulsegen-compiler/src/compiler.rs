use std::collections::{BTreeMap, HashMap};

use ndpulsegen_wire::{
    encode_instructions, ChannelState, CodecError, CommandSink, Instruction, NUM_CHANNELS,
};
use tracing::debug;

use crate::channel::Channel;
use crate::error::{CompilerError, Result, UploadError};
use crate::program::Program;
use crate::time::Time;
use crate::timeline::{GotoSpec, TimelineEvent, UpdateFlags};

/// Builder for a pulse sequence.
///
/// Holds the starting state, a sparse timeline keyed by clock cycle, and an
/// optional total sequence duration. All of it persists across calls to
/// [`compile`](Self::compile), which never mutates the builder.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    starting_state: ChannelState,
    timeline: BTreeMap<u64, TimelineEvent>,
    sequence_duration: Option<u64>,
    channels: BTreeMap<usize, Channel>,
}

impl Compiler {
    /// Create an empty builder with every channel starting low.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule channel changes and flags at `t`.
    ///
    /// Edits at an existing time merge into that event: channels and flags
    /// not mentioned here keep their previously scheduled values.
    pub fn add_update<I>(&mut self, t: impl Into<Time>, overrides: I, flags: UpdateFlags) -> Result<()>
    where
        I: IntoIterator<Item = (usize, bool)>,
    {
        let t = t.into().to_cycles()?;
        let overrides = validate_overrides(overrides)?;
        self.update_at(t, &overrides, flags);
        Ok(())
    }

    pub(crate) fn update_at(&mut self, t: u64, overrides: &[(usize, bool)], flags: UpdateFlags) {
        let event = self.timeline.entry(t).or_default();
        event.merge_overrides(overrides);
        event.merge_flags(flags);
    }

    /// Branch to the instruction at `t_to` once the cycle before `t_from` has run.
    ///
    /// The instruction covering `[t_from - 1, t_from)` carries the jump and
    /// `t_to` is guaranteed an address even if nothing else happens there.
    pub fn add_goto(&mut self, t_from: impl Into<Time>, t_to: impl Into<Time>, counter: u32) -> Result<()> {
        let t_from = t_from.into().to_cycles()?;
        let t_to = t_to.into().to_cycles()?;
        let carrier = t_from.checked_sub(1).ok_or(CompilerError::GotoAtTimeZero)?;

        self.timeline.entry(carrier).or_default().set_goto(GotoSpec {
            target: t_to,
            counter,
        });
        self.timeline.entry(t_to).or_default();
        Ok(())
    }

    /// Handle for channel `n`. Repeated calls return the same handle.
    pub fn channel(&mut self, n: usize) -> Result<Channel> {
        if n >= NUM_CHANNELS {
            return Err(CompilerError::ChannelOutOfRange(n));
        }
        Ok(*self.channels.entry(n).or_insert_with(|| Channel::new(n)))
    }

    /// Handle for channel `n`, also setting its level in the starting state.
    pub fn channel_with_starting_state(&mut self, n: usize, level: bool) -> Result<Channel> {
        let channel = self.channel(n)?;
        self.set_starting_state([(n, level)])?;
        Ok(channel)
    }

    /// Channels handed out so far, in ascending order.
    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.channels.values().copied()
    }

    /// Set the total length of the sequence.
    ///
    /// Must extend past every event already scheduled; this is checked again
    /// at compile time.
    pub fn set_sequence_duration(&mut self, total: impl Into<Time>) -> Result<()> {
        let total = total.into().to_cycles()?;
        if let Some(&last_event) = self.timeline.keys().next_back() {
            if total <= last_event {
                return Err(CompilerError::SequenceTooShort {
                    duration: total,
                    last_event,
                });
            }
        }
        self.sequence_duration = Some(total);
        Ok(())
    }

    /// Total sequence length in cycles, if set.
    pub fn sequence_duration(&self) -> Option<u64> {
        self.sequence_duration
    }

    /// Change channel levels in the state the sequence starts from.
    pub fn set_starting_state<I>(&mut self, overrides: I) -> Result<()>
    where
        I: IntoIterator<Item = (usize, bool)>,
    {
        for (channel, level) in validate_overrides(overrides)? {
            self.starting_state.set(channel, level)?;
        }
        Ok(())
    }

    /// State the sequence starts from.
    pub fn starting_state(&self) -> ChannelState {
        self.starting_state
    }

    /// Scheduled events, in time order.
    pub fn timeline(&self) -> &BTreeMap<u64, TimelineEvent> {
        &self.timeline
    }

    /// Drop every scheduled event and the sequence duration.
    ///
    /// The starting state and channel handles are kept.
    pub fn clear_updates(&mut self) {
        self.timeline.clear();
        self.sequence_duration = None;
    }

    /// Compile the timeline into a program.
    ///
    /// Each distinct event time becomes one instruction lasting until the
    /// next event. Address 0 always starts at time 0 with the starting state,
    /// and the last instruction lasts until the sequence duration (or one
    /// cycle when none is set).
    pub fn compile(&self) -> Result<Program> {
        if self.timeline.is_empty() {
            return Ok(Program::empty());
        }

        let mut events = self.timeline.clone();
        events
            .entry(0)
            .or_insert_with(|| TimelineEvent::snapshot(self.starting_state));

        let last_event = events.keys().next_back().copied().unwrap_or(0);
        let end = match self.sequence_duration {
            None => last_event.checked_add(1).ok_or(CompilerError::TimeOverflow)?,
            Some(duration) if duration > last_event => duration,
            Some(duration) => {
                return Err(CompilerError::SequenceTooShort {
                    duration,
                    last_event,
                })
            }
        };

        // A goto carrier must last exactly one cycle so the jump lands at t_from.
        let carriers: Vec<u64> = events
            .iter()
            .filter(|(_, event)| event.goto().is_some())
            .map(|(&t, _)| t)
            .collect();
        for carrier in carriers {
            let boundary = carrier + 1;
            if boundary < end {
                events.entry(boundary).or_default();
            }
        }

        if events.len() > usize::from(u16::MAX) + 1 {
            return Err(CodecError::FieldOutOfRange {
                field: "address",
                value: (events.len() - 1) as u64,
                max: u64::from(u16::MAX),
            }
            .into());
        }
        let address_of: HashMap<u64, u16> = events
            .keys()
            .enumerate()
            .map(|(address, &t)| (t, address as u16))
            .collect();
        let times: Vec<u64> = events.keys().copied().collect();

        let mut state = self.starting_state;
        let mut instructions = Vec::with_capacity(events.len());
        for (index, (&t, event)) in events.iter().enumerate() {
            let next = times.get(index + 1).copied().unwrap_or(end);
            for (&channel, &level) in event.overrides() {
                state.set(channel, level)?;
            }
            let (goto_address, goto_counter) = match event.goto() {
                Some(goto) => {
                    let address = address_of
                        .get(&goto.target)
                        .copied()
                        .ok_or(CompilerError::MissingGotoTarget {
                            target: goto.target,
                        })?;
                    (address, goto.counter)
                }
                None => (0, 0),
            };
            instructions.push(Instruction {
                address: index as u16,
                duration: next - t,
                state,
                goto_address,
                goto_counter,
                flags: event.flags().resolve(),
            });
        }

        let words = encode_instructions(&instructions)?;
        debug!(
            events = self.timeline.len(),
            instructions = instructions.len(),
            end,
            "compiled program"
        );
        Ok(Program::new(instructions, words))
    }

    /// Compile and upload: instructions first, then the final address.
    pub fn upload_instructions<S: CommandSink>(&self, sink: &S) -> std::result::Result<Program, UploadError> {
        let program = self.compile()?;
        program.upload(sink)?;
        Ok(program)
    }
}

fn validate_overrides<I>(overrides: I) -> Result<Vec<(usize, bool)>>
where
    I: IntoIterator<Item = (usize, bool)>,
{
    overrides
        .into_iter()
        .map(|(channel, level)| {
            if channel < NUM_CHANNELS {
                Ok((channel, level))
            } else {
                Err(CompilerError::ChannelOutOfRange(channel))
            }
        })
        .collect()
}
