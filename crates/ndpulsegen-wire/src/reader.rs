use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{CodecError, Result, WireError};
use crate::ids::message_name;
use crate::message::Message;
use crate::registry::{lookup, MAX_FRAME_LEN};

/// Why bytes were discarded instead of decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The id byte is not registered; exactly that byte was consumed.
    UnknownId,
    /// The payload did not arrive before the read timeout or end of stream.
    ShortPayload,
    /// A stop was requested while the payload was still arriving.
    Abandoned,
}

/// Outcome of one framing step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    /// A complete, decoded message.
    Message(Message),
    /// Bytes were discarded; scanning resumes at the next byte.
    Dropped { id: u8, reason: DropReason },
    /// A complete frame whose payload failed to decode.
    Malformed { id: u8, error: CodecError },
    /// The read timed out with no byte available.
    Idle,
}

/// Reads fixed-length telemetry frames from any `Read` stream.
///
/// Each call consumes at most one frame. Timeouts never block past the
/// underlying stream's own read timeout, and a desynchronized stream recovers
/// one byte at a time.
pub struct MessageReader<T> {
    inner: T,
    stop: Option<Arc<AtomicBool>>,
    buf: [u8; MAX_FRAME_LEN],
}

impl<T: Read> MessageReader<T> {
    /// Create a new message reader.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            stop: None,
            buf: [0; MAX_FRAME_LEN],
        }
    }

    /// Abandon partially received frames once `stop` is set.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Read the next frame.
    ///
    /// Returns `Err(WireError::ConnectionClosed)` when EOF is reached between
    /// frames; EOF inside a frame is reported as a short payload.
    pub fn read_event(&mut self) -> Result<ReadEvent> {
        let mut id = [0u8; 1];
        loop {
            match self.inner.read(&mut id) {
                Ok(0) => return Err(WireError::ConnectionClosed),
                Ok(_) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_timeout(&err) => return Ok(ReadEvent::Idle),
                Err(err) => return Err(WireError::Io(err)),
            }
        }
        let id = id[0];

        let Some(spec) = lookup(id) else {
            debug!(id, "dropping byte with unknown message id");
            return Ok(ReadEvent::Dropped {
                id,
                reason: DropReason::UnknownId,
            });
        };

        let payload_len = spec.payload_len();
        let mut filled = 0usize;
        while filled < payload_len {
            match self.inner.read(&mut self.buf[filled..payload_len]) {
                Ok(0) => return Ok(self.short(id, filled, DropReason::ShortPayload)),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_timeout(&err) => {
                    let reason = if self.stop_requested() {
                        DropReason::Abandoned
                    } else {
                        DropReason::ShortPayload
                    };
                    return Ok(self.short(id, filled, reason));
                }
                Err(err) => return Err(WireError::Io(err)),
            }
        }

        trace!(id, name = message_name(id), "received frame");
        match spec.decode_payload(&self.buf[..payload_len]) {
            Ok(message) => Ok(ReadEvent::Message(message)),
            Err(error) => Ok(ReadEvent::Malformed { id, error }),
        }
    }

    fn short(&self, id: u8, received: usize, reason: DropReason) -> ReadEvent {
        debug!(id, received, ?reason, "dropping incomplete frame");
        ReadEvent::Dropped { id, reason }
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|stop| stop.load(Ordering::Acquire))
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::ids;
    use crate::message::{encode_message, DeviceStateExtras, Print};

    fn print(value: u64) -> Message {
        Message::Print(Print {
            easy_printed_value: value,
        })
    }

    fn wire(messages: &[Message]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for message in messages {
            encode_message(message, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn read_single_message() {
        let mut reader = MessageReader::new(Cursor::new(wire(&[print(9)])));
        assert_eq!(reader.read_event().unwrap(), ReadEvent::Message(print(9)));
        assert!(matches!(
            reader.read_event(),
            Err(WireError::ConnectionClosed)
        ));
    }

    #[test]
    fn unknown_id_consumes_one_byte_then_resyncs() {
        let mut bytes = vec![0x00];
        bytes.extend(wire(&[print(1)]));

        let mut reader = MessageReader::new(Cursor::new(bytes));
        assert_eq!(
            reader.read_event().unwrap(),
            ReadEvent::Dropped {
                id: 0x00,
                reason: DropReason::UnknownId,
            }
        );
        assert_eq!(reader.read_event().unwrap(), ReadEvent::Message(print(1)));
    }

    #[test]
    fn garbage_run_reports_one_drop_per_byte() {
        let mut bytes = vec![0x01, 0x02, 0xFE];
        bytes.extend(wire(&[print(5)]));

        let mut reader = MessageReader::new(Cursor::new(bytes));
        for expected in [0x01, 0x02, 0xFE] {
            assert_eq!(
                reader.read_event().unwrap(),
                ReadEvent::Dropped {
                    id: expected,
                    reason: DropReason::UnknownId,
                }
            );
        }
        assert_eq!(reader.read_event().unwrap(), ReadEvent::Message(print(5)));
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: wire(&[print(77), print(78)]),
            pos: 0,
        };
        let mut reader = MessageReader::new(byte_reader);
        assert_eq!(reader.read_event().unwrap(), ReadEvent::Message(print(77)));
        assert_eq!(reader.read_event().unwrap(), ReadEvent::Message(print(78)));
    }

    #[test]
    fn eof_mid_payload_is_short() {
        let mut bytes = wire(&[print(3)]);
        bytes.truncate(4);

        let mut reader = MessageReader::new(Cursor::new(bytes));
        assert_eq!(
            reader.read_event().unwrap(),
            ReadEvent::Dropped {
                id: ids::PRINT,
                reason: DropReason::ShortPayload,
            }
        );
    }

    #[test]
    fn timeout_between_frames_is_idle() {
        let mut reader = MessageReader::new(TimedOutReader {
            bytes: Vec::new(),
            pos: 0,
        });
        assert_eq!(reader.read_event().unwrap(), ReadEvent::Idle);
        assert_eq!(reader.read_event().unwrap(), ReadEvent::Idle);
    }

    #[test]
    fn timeout_mid_payload_drops_frame_and_resumes() {
        let mut bytes = wire(&[print(3)]);
        bytes.truncate(5);
        let mut reader = MessageReader::new(TimedOutReader { bytes, pos: 0 });

        assert_eq!(
            reader.read_event().unwrap(),
            ReadEvent::Dropped {
                id: ids::PRINT,
                reason: DropReason::ShortPayload,
            }
        );

        let extras = Message::DeviceStateExtras(DeviceStateExtras { run_time: 4 });
        reader.get_mut().bytes.extend(wire(&[extras]));
        assert_eq!(reader.read_event().unwrap(), ReadEvent::Message(extras));
    }

    #[test]
    fn stop_flag_abandons_partial_frame() {
        let mut bytes = wire(&[print(3)]);
        bytes.truncate(2);
        let stop = Arc::new(AtomicBool::new(true));
        let mut reader = MessageReader::new(TimedOutReader { bytes, pos: 0 }).with_stop_flag(stop);

        assert_eq!(
            reader.read_event().unwrap(),
            ReadEvent::Dropped {
                id: ids::PRINT,
                reason: DropReason::Abandoned,
            }
        );
    }

    #[test]
    fn malformed_payload_is_reported_not_fatal() {
        let mut frame = wire(&[Message::DeviceStateExtras(DeviceStateExtras { run_time: 1 })]);
        frame[0] = ids::DEVICESTATE;
        frame.extend([0u8; 12]);
        frame[7] = 9;
        frame.extend(wire(&[print(2)]));

        let mut reader = MessageReader::new(Cursor::new(frame));
        assert!(matches!(
            reader.read_event().unwrap(),
            ReadEvent::Malformed {
                id: ids::DEVICESTATE,
                error: CodecError::InvalidEnum { field: "clock_source", value: 9 },
            }
        ));
        assert_eq!(reader.read_event().unwrap(), ReadEvent::Message(print(2)));
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(wire(&[print(8)])),
        };
        let mut framed = MessageReader::new(reader);
        assert_eq!(framed.read_event().unwrap(), ReadEvent::Message(print(8)));
    }

    #[test]
    fn hard_io_error_propagates() {
        let mut reader = MessageReader::new(BrokenReader);
        let err = reader.read_event().unwrap_err();
        assert!(matches!(err, WireError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = MessageReader::new(Cursor::new(Vec::<u8>::new()));
        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    /// Serves its bytes one at a time, then times out instead of hitting EOF.
    struct TimedOutReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for TimedOutReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() {
                return Err(std::io::Error::from(ErrorKind::TimedOut));
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }
    }
}
