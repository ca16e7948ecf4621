//! A software stand-in for the pulse generator.
//!
//! [`Simulator`] answers commands on the device end of a [`MemoryPort`]:
//! echoes, state requests and debug words get replies, while instructions
//! and options are stored for inspection. Its state outlives individual
//! connections, like the firmware's would.

use std::collections::BTreeMap;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ndpulsegen_transport::{MemoryBackend, MemoryPort, PortInfo};
use ndpulsegen_wire::{
    command_length, decode_command, Action, ChannelState, ClockSource, Command, DeviceOptions,
    DeviceState, DeviceStateExtras, Echo, FirmwareVersion, HardwareTrigger, Instruction, Message,
    Notification, PowerlineState, PowerlineTriggerOptions, Print, RunMode,
};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::config::{DEFAULT_USB_PID, DEFAULT_USB_VID};

const POLL_TIMEOUT: Duration = Duration::from_millis(20);

/// Mains period reported by the simulator, 50 Hz in cycles.
const POWERLINE_PERIOD: u32 = 2_000_000;

/// What a simulated device reports about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub device_type: u8,
    pub hardware_version: u8,
    pub firmware_version: FirmwareVersion,
    pub serial_number: u32,
    /// Ignore echo commands, as a port with some other device behind it would.
    pub silent: bool,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            device_type: 1,
            hardware_version: 2,
            firmware_version: FirmwareVersion {
                major: 1,
                minor: 0,
                patch: 0,
            },
            serial_number: 1,
            silent: false,
        }
    }
}

impl DeviceIdentity {
    pub fn with_serial_number(serial_number: u32) -> Self {
        Self {
            serial_number,
            ..Self::default()
        }
    }

    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
struct DeviceMemory {
    commands: Vec<Command>,
    instructions: BTreeMap<u16, Instruction>,
    final_address: u16,
    run_mode: Option<RunMode>,
    accept_hardware_trigger: Option<HardwareTrigger>,
    trigger_out_length: u32,
    trigger_out_delay: u64,
    notify_on_main_trig_out: bool,
    notify_on_run_finished: bool,
    software_run_enable: bool,
    static_state: ChannelState,
    trigger_on_powerline: bool,
    powerline_trigger_delay: u32,
}

impl DeviceMemory {
    fn apply_options(&mut self, options: &DeviceOptions) {
        if let Some(final_address) = options.final_address {
            self.final_address = final_address;
        }
        if options.run_mode.is_some() {
            self.run_mode = options.run_mode;
        }
        if options.accept_hardware_trigger.is_some() {
            self.accept_hardware_trigger = options.accept_hardware_trigger;
        }
        if let Some(length) = options.trigger_out_length {
            self.trigger_out_length = length;
        }
        if let Some(delay) = options.trigger_out_delay {
            self.trigger_out_delay = delay;
        }
        if let Some(notify) = options.notify_on_main_trig_out {
            self.notify_on_main_trig_out = notify;
        }
        if let Some(notify) = options.notify_on_run_finished {
            self.notify_on_run_finished = notify;
        }
        if let Some(enable) = options.software_run_enable {
            self.software_run_enable = enable;
        }
    }

    fn apply_powerline(&mut self, options: &PowerlineTriggerOptions) {
        if let Some(trigger) = options.trigger_on_powerline {
            self.trigger_on_powerline = trigger;
        }
        if let Some(delay) = options.powerline_trigger_delay {
            self.powerline_trigger_delay = delay;
        }
    }

    /// Cycles from address 0 through `final_address`.
    fn run_time(&self) -> u64 {
        self.instructions
            .range(..=self.final_address)
            .map(|(_, instruction)| instruction.duration)
            .sum()
    }

    fn device_state(&self) -> DeviceState {
        DeviceState {
            running: false,
            software_run_enable: self.software_run_enable,
            hardware_run_enable: false,
            notify_on_run_finished: self.notify_on_run_finished,
            notify_on_main_trig_out: self.notify_on_main_trig_out,
            current_address: 0,
            final_address: self.final_address,
            accept_hardware_trigger: self
                .accept_hardware_trigger
                .unwrap_or(HardwareTrigger::Never),
            clock_source: ClockSource::Internal,
            trigger_out_length: self.trigger_out_length,
            trigger_out_delay: self.trigger_out_delay,
            state: self.static_state,
        }
    }

    fn powerline_state(&self) -> PowerlineState {
        PowerlineState {
            trig_on_powerline: self.trigger_on_powerline,
            powerline_locked: true,
            powerline_period: POWERLINE_PERIOD,
            powerline_trigger_delay: self.powerline_trigger_delay,
        }
    }
}

struct Shared {
    identity: DeviceIdentity,
    memory: Mutex<DeviceMemory>,
    received: Condvar,
    link: Mutex<Option<MemoryPort>>,
}

/// A simulated pulse generator. Clones share one device.
#[derive(Clone)]
pub struct Simulator {
    shared: Arc<Shared>,
}

impl Simulator {
    pub fn new(identity: DeviceIdentity) -> Self {
        Self {
            shared: Arc::new(Shared {
                identity,
                memory: Mutex::new(DeviceMemory::default()),
                received: Condvar::new(),
                link: Mutex::new(None),
            }),
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.shared.identity
    }

    /// Port metadata with the pulse generator's USB ids.
    pub fn port_info(&self, name: &str) -> PortInfo {
        let mut info = PortInfo::new(name).with_usb_ids(DEFAULT_USB_VID, DEFAULT_USB_PID);
        info.serial_number = Some(self.shared.identity.serial_number.to_string());
        info.product = Some("ndpulsegen simulator".to_string());
        info
    }

    /// Expose this device as port `name` on `backend`.
    ///
    /// Every open of the port starts a fresh link to the same device.
    pub fn register(&self, backend: &MemoryBackend, name: &str) {
        let simulator = self.clone();
        backend.add_port(self.port_info(name), move || {
            let (host, device) = MemoryPort::pair();
            simulator.serve(device)?;
            Ok(host)
        });
    }

    /// Answer commands arriving on `port` until its host end closes.
    pub fn serve(&self, mut port: MemoryPort) -> io::Result<()> {
        port.set_timeout(POLL_TIMEOUT);
        *self.shared.link.lock() = Some(port.clone());
        let simulator = self.clone();
        thread::Builder::new()
            .name("ndpulsegen-sim".to_string())
            .spawn(move || simulator.run(port))?;
        Ok(())
    }

    /// Write raw bytes to the host on the current link.
    pub fn inject(&self, bytes: &[u8]) -> io::Result<()> {
        match self.shared.link.lock().as_mut() {
            Some(link) => link.write_all(bytes),
            None => Err(io::Error::new(ErrorKind::NotConnected, "no host link")),
        }
    }

    /// Send a telemetry message to the host on the current link.
    pub fn send(&self, message: &Message) -> io::Result<()> {
        let frame = message
            .to_bytes()
            .map_err(|err| io::Error::new(ErrorKind::InvalidInput, err))?;
        self.inject(&frame)
    }

    /// Every command received so far, in arrival order.
    pub fn commands(&self) -> Vec<Command> {
        self.shared.memory.lock().commands.clone()
    }

    /// Stored program, ordered by address.
    pub fn instructions(&self) -> Vec<Instruction> {
        self.shared
            .memory
            .lock()
            .instructions
            .values()
            .copied()
            .collect()
    }

    pub fn final_address(&self) -> u16 {
        self.shared.memory.lock().final_address
    }

    pub fn static_state(&self) -> ChannelState {
        self.shared.memory.lock().static_state
    }

    /// Block until at least `count` commands have arrived.
    ///
    /// Returns false if `timeout` expires first.
    pub fn wait_for_commands(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut memory = self.shared.memory.lock();
        while memory.commands.len() < count {
            if self
                .shared
                .received
                .wait_until(&mut memory, deadline)
                .timed_out()
            {
                return memory.commands.len() >= count;
            }
        }
        true
    }

    fn run(&self, mut port: MemoryPort) {
        debug!(serial_number = self.shared.identity.serial_number, "simulator link up");
        loop {
            let mut id = [0u8; 1];
            match port.read(&mut id) {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) if err.kind() == ErrorKind::TimedOut => continue,
                Err(err) => {
                    warn!(error = %err, "simulator read failed");
                    break;
                }
            }

            let Some(length) = command_length(id[0]) else {
                debug!(id = id[0], "simulator ignoring unknown command byte");
                continue;
            };
            let mut frame = vec![0u8; length];
            frame[0] = id[0];
            if let Err(err) = read_payload(&mut port, &mut frame[1..]) {
                debug!(id = id[0], error = %err, "simulator dropped partial command");
                if err.kind() == ErrorKind::UnexpectedEof {
                    break;
                }
                continue;
            }

            match decode_command(&frame) {
                Ok(command) => {
                    for reply in self.handle(command) {
                        let sent = reply
                            .to_bytes()
                            .map_err(|err| io::Error::new(ErrorKind::InvalidData, err))
                            .and_then(|bytes| port.write_all(&bytes));
                        if let Err(err) = sent {
                            warn!(error = %err, "simulator could not send reply");
                        }
                    }
                }
                Err(err) => warn!(id = id[0], error = %err, "simulator rejected command"),
            }
        }
        debug!("simulator link down");
    }

    fn handle(&self, command: Command) -> Vec<Message> {
        let identity = &self.shared.identity;
        let mut memory = self.shared.memory.lock();
        memory.commands.push(command);
        self.shared.received.notify_all();

        match command {
            Command::Echo(byte) if !identity.silent => vec![Message::Echo(Echo {
                echoed_byte: byte,
                device_type: identity.device_type,
                hardware_version: identity.hardware_version,
                firmware_version: identity.firmware_version,
                serial_number: identity.serial_number,
            })],
            Command::Echo(_) => Vec::new(),
            Command::Instruction(instruction) => {
                memory.instructions.insert(instruction.address, instruction);
                Vec::new()
            }
            Command::DeviceOptions(options) => {
                memory.apply_options(&options);
                Vec::new()
            }
            Command::PowerlineTriggerOptions(options) => {
                memory.apply_powerline(&options);
                Vec::new()
            }
            Command::StaticState(state) => {
                memory.static_state = state;
                Vec::new()
            }
            Command::GeneralDebug(word) => vec![Message::Print(Print {
                easy_printed_value: word,
            })],
            Command::Action(action) => action_replies(&memory, action),
        }
    }
}

fn action_replies(memory: &DeviceMemory, action: Action) -> Vec<Message> {
    let mut replies = Vec::new();
    if action.trigger_now && memory.notify_on_run_finished {
        replies.push(Message::Notification(Notification {
            address: memory.final_address,
            address_notify: false,
            trigger_notify: false,
            finished_notify: true,
            run_time: memory.run_time(),
        }));
    }
    if action.request_state {
        replies.push(Message::DeviceState(memory.device_state()));
    }
    if action.request_powerline_state {
        replies.push(Message::PowerlineState(memory.powerline_state()));
    }
    if action.request_state_extras {
        replies.push(Message::DeviceStateExtras(DeviceStateExtras {
            run_time: memory.run_time(),
        }));
    }
    replies
}

fn read_payload(port: &mut MemoryPort, buf: &mut [u8]) -> io::Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match port.read(&mut buf[filled..]) {
            Ok(0) => return Err(io::Error::from(ErrorKind::UnexpectedEof)),
            Ok(n) => filled += n,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
