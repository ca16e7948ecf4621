use ndpulsegen_transport::PortBackend;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::DeviceConfig;
use crate::error::{DeviceError, Result};
use crate::handshake::{probe, DeviceInfo};

/// Ports that look like pulse generators, split by whether they answered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedDevices {
    /// Ports that answered the echo probe.
    pub validated: Vec<DeviceInfo>,
    /// Ports with the right USB ids that could not be opened or did not answer.
    pub unvalidated: Vec<String>,
}

impl ConnectedDevices {
    /// Validated device with the given serial number.
    pub fn find_serial(&self, serial_number: u32) -> Option<&DeviceInfo> {
        self.validated
            .iter()
            .find(|device| device.serial_number == serial_number)
    }
}

/// Probe every port whose USB ids match `config`.
///
/// Each candidate is opened briefly and sent an echo probe. A port that
/// fails to open or answer is reported as unvalidated; only a failure to
/// enumerate ports at all is an error.
pub fn get_connected_devices(
    backend: &dyn PortBackend,
    config: &DeviceConfig,
) -> Result<ConnectedDevices> {
    let mut devices = ConnectedDevices::default();
    let candidates = backend
        .available_ports()?
        .into_iter()
        .filter(|info| info.matches_usb(config.usb_vid, config.usb_pid));

    for candidate in candidates {
        let outcome = backend
            .open(&candidate.name, &config.probe_settings())
            .map_err(DeviceError::from)
            .and_then(|mut stream| probe(&mut stream, &config.handshake));
        match outcome {
            Ok(device) => devices.validated.push(device),
            Err(err) => {
                warn!(port = %candidate.name, error = %err, "port did not validate");
                devices.unvalidated.push(candidate.name);
            }
        }
    }

    debug!(
        validated = devices.validated.len(),
        unvalidated = devices.unvalidated.len(),
        "device scan complete"
    );
    Ok(devices)
}
