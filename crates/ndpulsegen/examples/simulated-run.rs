//! Compile a sequence, upload it to a simulated device and print its telemetry.
//!
//! Run with:
//!   cargo run --example simulated-run --features logging

use std::sync::Arc;
use std::time::Duration;

use ndpulsegen::compiler::{Compiler, Pulse, Time, UpdateFlags};
use ndpulsegen::device::{DeviceIdentity, PulseGenerator, Simulator, Target};
use ndpulsegen::logging::init_logging_from_env;
use ndpulsegen::transport::MemoryBackend;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_from_env();

    let backend = Arc::new(MemoryBackend::new());
    let simulator = Simulator::new(DeviceIdentity::with_serial_number(4242));
    simulator.register(&backend, "sim0");

    let generator = PulseGenerator::new().with_backend(Arc::clone(&backend));
    println!(
        "{}",
        serde_json::to_string_pretty(&generator.get_connected_devices()?)?
    );
    generator.connect(Target::SerialNumber(4242))?;

    let mut compiler = Compiler::new();
    let shutter = compiler.channel_with_starting_state(3, true)?;
    shutter.pulse_low(
        &mut compiler,
        Time::cycles(5),
        Pulse::new(Time::cycles(20)).idle(Time::cycles(5)).repeat(3),
        UpdateFlags::NONE,
    )?;
    compiler.add_goto(Time::cycles(80), Time::cycles(5), 2)?;
    compiler.set_sequence_duration(Time::cycles(100))?;

    let program = compiler.upload_instructions(&generator)?;
    println!("{}", serde_json::to_string_pretty(&program)?);

    let state = generator.get_state(Duration::from_secs(1))?;
    println!("{}", serde_json::to_string_pretty(&state)?);
    println!(
        "device stored {} instructions, final address {}",
        simulator.instructions().len(),
        simulator.final_address()
    );

    generator.disconnect();
    Ok(())
}
