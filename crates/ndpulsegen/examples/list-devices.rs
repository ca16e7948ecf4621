//! Probe every FTDI serial port and print the pulse generators found.
//!
//! Run with:
//!   cargo run --example list-devices --features logging
//!
//! Set NDPULSEGEN_LOG_FORMAT=json for machine-readable logs on stderr.

use ndpulsegen::device::PulseGenerator;
use ndpulsegen::logging::init_logging_from_env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_from_env();

    let devices = PulseGenerator::new().get_connected_devices()?;
    if devices.validated.is_empty() && devices.unvalidated.is_empty() {
        eprintln!("No candidate ports found");
        return Ok(());
    }

    for device in &devices.validated {
        println!(
            "{}  serial {}  type {}  hardware {}  firmware {}",
            device.port,
            device.serial_number,
            device.device_type,
            device.hardware_version,
            device.firmware_version
        );
    }
    for port in &devices.unvalidated {
        println!("{port}  (did not answer)");
    }
    Ok(())
}
