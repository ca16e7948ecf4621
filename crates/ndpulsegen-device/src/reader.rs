use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError};
use ndpulsegen_transport::PortStream;
use ndpulsegen_wire::{ids::message_name, MessageReader, ReadEvent};
use tracing::{debug, warn};

use crate::config::ReaderConfig;
use crate::error::{DeviceError, Result};
use crate::events::{DeviceEvent, Subscribers};

/// A running background reader.
pub(crate) struct ReaderHandle {
    stop: Arc<AtomicBool>,
    cancel: PortStream,
    done: Receiver<()>,
    thread: JoinHandle<()>,
}

impl ReaderHandle {
    /// Start reading telemetry from `stream` on a new thread.
    pub(crate) fn spawn(
        stream: PortStream,
        subscribers: Arc<Subscribers>,
        config: &ReaderConfig,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let cancel = stream.try_clone()?;
        // Dropped by the thread on exit; `done` then reports disconnection.
        let (done_tx, done) = bounded::<()>(0);

        let reader = MessageReader::new(stream).with_stop_flag(Arc::clone(&stop));
        let thread_stop = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                let _done = done_tx;
                run(reader, &thread_stop, &subscribers);
            })
            .map_err(DeviceError::ReaderSpawn)?;

        Ok(Self {
            stop,
            cancel,
            done,
            thread,
        })
    }

    /// Ask the reader to stop and wait up to `timeout` for it to exit.
    ///
    /// A reader that does not exit in time is detached.
    pub(crate) fn stop(self, timeout: Duration) {
        self.stop.store(true, Ordering::Release);
        self.cancel.cancel_read();

        match self.done.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) | Ok(()) => {
                if self.thread.join().is_err() {
                    warn!(port = %self.cancel.name(), "reader thread panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    port = %self.cancel.name(),
                    ?timeout,
                    "reader did not stop in time; detaching"
                );
            }
        }
    }
}

fn run(mut reader: MessageReader<PortStream>, stop: &AtomicBool, subscribers: &Subscribers) {
    let port = reader.get_ref().name().to_string();
    debug!(port = %port, "reader started");

    while !stop.load(Ordering::Acquire) {
        let event = match reader.read_event() {
            Ok(ReadEvent::Idle) => continue,
            Ok(ReadEvent::Message(message)) => DeviceEvent::Message {
                message,
                at: SystemTime::now(),
            },
            Ok(ReadEvent::Dropped { id, reason }) => {
                warn!(port = %port, id, ?reason, "dropped bytes");
                DeviceEvent::BytesDropped {
                    id,
                    reason,
                    at: SystemTime::now(),
                }
            }
            Ok(ReadEvent::Malformed { id, error }) => DeviceEvent::Error {
                message: format!("decode failed for {} ({id}): {error}", message_name(id)),
            },
            Err(err) => {
                warn!(port = %port, error = %err, "reader stopped on error");
                subscribers.publish(DeviceEvent::Error {
                    message: err.to_string(),
                });
                break;
            }
        };
        subscribers.publish(event);
    }

    debug!(port = %port, "reader finished");
    subscribers.publish(DeviceEvent::Finished);
}
