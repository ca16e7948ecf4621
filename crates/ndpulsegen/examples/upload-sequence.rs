//! Upload a short pulse train to a connected device and run it once.
//!
//! Run with:
//!   cargo run --example upload-sequence --features logging -- [serial-number]

use std::time::Duration;

use ndpulsegen::compiler::{Compiler, FlagsMode, Pulse, Time, UpdateFlags};
use ndpulsegen::device::{DeviceEvent, PulseGenerator, Target, Topic};
use ndpulsegen::logging::init_logging_from_env;
use ndpulsegen::wire::{Action, DeviceOptions, HardwareTrigger, MessageCategory, RunMode};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_from_env();

    let target = match std::env::args().nth(1) {
        Some(serial) => Target::SerialNumber(serial.parse()?),
        None => Target::Any,
    };

    let mut compiler = Compiler::new();
    let clock = compiler.channel(0)?;
    let gate = compiler.channel(1)?;

    // Gate high around ten 100 ns clock ticks; notify the host on the last edge.
    gate.high(&mut compiler, Time::cycles(0), UpdateFlags::NONE)?;
    let length = clock.pulse_high(
        &mut compiler,
        Time::cycles(10),
        Pulse::new(Time::seconds(50e-9))
            .idle(Time::seconds(50e-9))
            .repeat(10)
            .flags_mode(FlagsMode::End),
        UpdateFlags::NONE.with_notify_computer(true),
    )?;
    gate.low(&mut compiler, Time::cycles(10 + length + 10), UpdateFlags::NONE)?;

    let generator = PulseGenerator::new();
    generator.connect(target)?;
    let notifications = generator.subscribe(MessageCategory::Notification);
    let errors = generator.subscribe(Topic::Error);

    let program = compiler.upload_instructions(&generator)?;
    eprintln!(
        "Uploaded {} instructions ({} cycles)",
        program.len(),
        program.total_cycles()
    );

    generator.write_device_options(DeviceOptions {
        run_mode: Some(RunMode::Single),
        accept_hardware_trigger: Some(HardwareTrigger::Never),
        notify_on_run_finished: Some(true),
        software_run_enable: Some(true),
        ..DeviceOptions::default()
    })?;
    generator.write_action(Action {
        trigger_now: true,
        ..Action::default()
    })?;

    match notifications.recv_timeout(Duration::from_secs(2)) {
        Ok(DeviceEvent::Message { message, .. }) => {
            println!("{}", serde_json::to_string(&message)?);
        }
        Ok(_) | Err(_) => eprintln!("No notification received"),
    }
    for event in errors.try_iter() {
        eprintln!("{event:?}");
    }

    generator.disconnect();
    Ok(())
}
