use std::sync::Arc;
use std::time::Duration;

use ndpulsegen::compiler::{Compiler, Pulse, Time, UpdateFlags};
use ndpulsegen::device::{
    DeviceConfig, DeviceEvent, DeviceIdentity, HandshakeConfig, PulseGenerator, Simulator, Target,
};
use ndpulsegen::transport::MemoryBackend;
use ndpulsegen::wire::{Action, Command, DeviceOptions, Message, MessageCategory};

fn connected(serial_number: u32) -> (PulseGenerator, Simulator) {
    let backend = Arc::new(MemoryBackend::new());
    let simulator = Simulator::new(DeviceIdentity::with_serial_number(serial_number));
    simulator.register(&backend, "sim0");

    let generator = PulseGenerator::new()
        .with_backend(backend)
        .with_config(DeviceConfig {
            handshake: HandshakeConfig {
                read_timeout: Duration::from_millis(20),
                timeout: Duration::from_millis(500),
                ..HandshakeConfig::default()
            },
            ..DeviceConfig::default()
        });
    generator
        .connect(Target::SerialNumber(serial_number))
        .expect("simulated device should connect");
    (generator, simulator)
}

#[test]
fn compiled_program_arrives_in_upload_order() {
    let (generator, simulator) = connected(7);

    let mut compiler = Compiler::new();
    compiler
        .add_update(Time::cycles(0), [(0, true)], UpdateFlags::NONE)
        .expect("update at 0");
    compiler
        .add_update(Time::cycles(5), [(0, false)], UpdateFlags::NONE)
        .expect("update at 5");
    let program = compiler
        .upload_instructions(&generator)
        .expect("upload should succeed");

    // The discovery probe is recorded ahead of the upload.
    assert!(simulator.wait_for_commands(4, Duration::from_secs(2)));
    let commands = simulator.commands();
    let upload: Vec<Command> = commands
        .iter()
        .copied()
        .filter(|command| !matches!(command, Command::Echo(_)))
        .collect();
    assert_eq!(
        upload,
        vec![
            Command::Instruction(program.instructions()[0]),
            Command::Instruction(program.instructions()[1]),
            Command::DeviceOptions(DeviceOptions::final_address(1)),
        ]
    );

    let stored = simulator.instructions();
    assert_eq!(stored.len(), 2);
    assert_eq!((stored[0].duration, stored[0].state.get(0)), (5, true));
    assert_eq!((stored[1].duration, stored[1].state.get(0)), (1, false));
    assert_eq!(simulator.final_address(), 1);
}

#[test]
fn pulse_train_runs_and_notifies() {
    let (generator, simulator) = connected(8);

    let mut compiler = Compiler::new();
    let channel = compiler.channel(2).expect("channel 2");
    let length = channel
        .pulse_high(
            &mut compiler,
            Time::cycles(3),
            Pulse::new(Time::cycles(2)).idle(Time::cycles(3)).repeat(3),
            UpdateFlags::NONE,
        )
        .expect("pulse train");
    assert_eq!(length, 12);

    let program = compiler
        .upload_instructions(&generator)
        .expect("upload should succeed");
    assert_eq!(program.total_cycles(), 3 + 12 + 1);

    let notifications = generator.subscribe(MessageCategory::Notification);
    generator
        .write_device_options(DeviceOptions {
            notify_on_run_finished: Some(true),
            ..DeviceOptions::default()
        })
        .expect("options");
    generator
        .write_action(Action {
            trigger_now: true,
            ..Action::default()
        })
        .expect("trigger");

    match notifications
        .recv_timeout(Duration::from_secs(2))
        .expect("run should finish")
    {
        DeviceEvent::Message {
            message: Message::Notification(notification),
            ..
        } => {
            assert!(notification.finished_notify);
            assert_eq!(notification.address, program.final_address().unwrap_or(0));
            assert_eq!(notification.run_time, program.total_cycles());
        }
        other => panic!("expected notification, got {other:?}"),
    }

    assert_eq!(simulator.instructions().len(), program.len());
}

#[test]
fn upload_after_disconnect_reports_sink_error() {
    let (generator, _simulator) = connected(9);
    generator.disconnect();

    let mut compiler = Compiler::new();
    compiler
        .add_update(Time::cycles(1), [(4, true)], UpdateFlags::NONE)
        .expect("update");
    let err = compiler
        .upload_instructions(&generator)
        .expect_err("upload should fail");
    assert!(matches!(err, ndpulsegen::compiler::UploadError::Sink(_)));
    assert!(err.to_string().contains("not connected"));
}
