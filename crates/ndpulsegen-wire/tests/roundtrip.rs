use ndpulsegen_wire::codec::MAX_U48;
use ndpulsegen_wire::{
    command_length, decode_command, Action, ChannelState, ClockSource, Command, DeviceOptions,
    DeviceState, DeviceStateExtras, Echo, ErrorReport, FirmwareVersion, HardwareTrigger,
    Instruction, InstructionFlags, Message, MessageReader, Notification, PowerlineState,
    PowerlineTriggerOptions, Print, ReadEvent, RunMode,
};
use proptest::option;
use proptest::prelude::*;

fn channel_state() -> impl Strategy<Value = ChannelState> {
    (0..=ChannelState::MASK).prop_map(ChannelState::from_bits_truncate)
}

fn run_mode() -> impl Strategy<Value = RunMode> {
    prop_oneof![Just(RunMode::Single), Just(RunMode::Continuous)]
}

fn hardware_trigger() -> impl Strategy<Value = HardwareTrigger> {
    prop_oneof![
        Just(HardwareTrigger::Never),
        Just(HardwareTrigger::Always),
        Just(HardwareTrigger::SingleRun),
        Just(HardwareTrigger::Once),
    ]
}

fn clock_source() -> impl Strategy<Value = ClockSource> {
    prop_oneof![Just(ClockSource::Internal), Just(ClockSource::External)]
}

fn firmware_version() -> impl Strategy<Value = FirmwareVersion> {
    any::<[u8; 3]>().prop_map(|[major, minor, patch]| FirmwareVersion {
        major,
        minor,
        patch,
    })
}

fn instruction() -> impl Strategy<Value = Instruction> {
    (
        any::<u16>(),
        1..=MAX_U48,
        channel_state(),
        any::<u16>(),
        any::<u32>(),
        any::<u8>(),
    )
        .prop_map(
            |(address, duration, state, goto_address, goto_counter, flags)| Instruction {
                address,
                duration,
                state,
                goto_address,
                goto_counter,
                flags: InstructionFlags::from_bits(flags & 0x0F),
            },
        )
}

fn device_options() -> impl Strategy<Value = DeviceOptions> {
    (
        option::of(any::<u16>()),
        option::of(run_mode()),
        option::of(hardware_trigger()),
        option::of(any::<u32>()),
        option::of(0..=MAX_U48),
        option::of(any::<bool>()),
        option::of(any::<bool>()),
        option::of(any::<bool>()),
    )
        .prop_map(
            |(
                final_address,
                run_mode,
                accept_hardware_trigger,
                trigger_out_length,
                trigger_out_delay,
                notify_on_main_trig_out,
                notify_on_run_finished,
                software_run_enable,
            )| DeviceOptions {
                final_address,
                run_mode,
                accept_hardware_trigger,
                trigger_out_length,
                trigger_out_delay,
                notify_on_main_trig_out,
                notify_on_run_finished,
                software_run_enable,
            },
        )
}

fn action() -> impl Strategy<Value = Action> {
    any::<[bool; 6]>().prop_map(|bits| Action {
        trigger_now: bits[0],
        disable_after_current_run: bits[1],
        disarm: bits[2],
        request_state: bits[3],
        request_powerline_state: bits[4],
        request_state_extras: bits[5],
    })
}

fn command() -> impl Strategy<Value = Command> {
    prop_oneof![
        any::<u8>().prop_map(Command::Echo),
        instruction().prop_map(Command::Instruction),
        device_options().prop_map(Command::DeviceOptions),
        action().prop_map(Command::Action),
        any::<u64>().prop_map(Command::GeneralDebug),
        channel_state().prop_map(Command::StaticState),
        (option::of(any::<bool>()), option::of(any::<u32>())).prop_map(
            |(trigger_on_powerline, powerline_trigger_delay)| {
                Command::PowerlineTriggerOptions(PowerlineTriggerOptions {
                    trigger_on_powerline,
                    powerline_trigger_delay,
                })
            }
        ),
    ]
}

fn device_state() -> impl Strategy<Value = DeviceState> {
    (
        any::<[bool; 5]>(),
        any::<u16>(),
        any::<u16>(),
        hardware_trigger(),
        clock_source(),
        any::<u32>(),
        0..=MAX_U48,
        channel_state(),
    )
        .prop_map(
            |(
                bools,
                current_address,
                final_address,
                accept_hardware_trigger,
                clock_source,
                trigger_out_length,
                trigger_out_delay,
                state,
            )| DeviceState {
                running: bools[0],
                software_run_enable: bools[1],
                hardware_run_enable: bools[2],
                notify_on_run_finished: bools[3],
                notify_on_main_trig_out: bools[4],
                current_address,
                final_address,
                accept_hardware_trigger,
                clock_source,
                trigger_out_length,
                trigger_out_delay,
                state,
            },
        )
}

fn message() -> impl Strategy<Value = Message> {
    prop_oneof![
        (any::<u8>(), any::<u8>(), any::<u8>(), firmware_version(), any::<u32>()).prop_map(
            |(echoed_byte, device_type, hardware_version, firmware_version, serial_number)| {
                Message::Echo(Echo {
                    echoed_byte,
                    device_type,
                    hardware_version,
                    firmware_version,
                    serial_number,
                })
            }
        ),
        device_state().prop_map(Message::DeviceState),
        (any::<u16>(), any::<[bool; 3]>(), any::<u64>()).prop_map(|(address, bits, run_time)| {
            Message::Notification(Notification {
                address,
                address_notify: bits[0],
                trigger_notify: bits[1],
                finished_notify: bits[2],
                run_time,
            })
        }),
        any::<u64>().prop_map(|easy_printed_value| Message::Print(Print { easy_printed_value })),
        any::<[u8; 8]>().prop_map(|payload| Message::Error(ErrorReport { payload })),
        (any::<[bool; 2]>(), any::<u32>(), any::<u32>()).prop_map(
            |(bits, powerline_period, powerline_trigger_delay)| {
                Message::PowerlineState(PowerlineState {
                    trig_on_powerline: bits[0],
                    powerline_locked: bits[1],
                    powerline_period,
                    powerline_trigger_delay,
                })
            }
        ),
        any::<u64>()
            .prop_map(|run_time| Message::DeviceStateExtras(DeviceStateExtras { run_time })),
    ]
}

proptest! {
    #[test]
    fn every_command_decodes_to_itself(command in command()) {
        let frame = command.to_bytes().expect("valid command should encode");
        prop_assert_eq!(Some(frame.len()), command_length(command.id()));
        prop_assert_eq!(decode_command(&frame), Ok(command));
    }

    #[test]
    fn every_message_decodes_to_itself(message in message()) {
        let frame = message.to_bytes().expect("valid message should encode");
        let mut reader = MessageReader::new(&frame[..]);
        let event = reader.read_event().expect("complete frame should read");
        prop_assert_eq!(event, ReadEvent::Message(message));
    }

    #[test]
    fn back_to_back_messages_stay_framed(messages in proptest::collection::vec(message(), 1..16)) {
        let mut stream = Vec::new();
        for message in &messages {
            stream.extend_from_slice(&message.to_bytes().expect("valid message should encode"));
        }

        let mut reader = MessageReader::new(&stream[..]);
        for message in messages {
            let event = reader.read_event().expect("frame should read");
            prop_assert_eq!(event, ReadEvent::Message(message));
        }
    }
}
