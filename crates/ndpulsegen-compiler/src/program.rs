use bytes::Bytes;
use ndpulsegen_wire::{Command, CommandSink, DeviceOptions, Instruction};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{CompilerError, UploadError};

/// A compiled, contiguously addressed instruction list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Program {
    instructions: Vec<Instruction>,
    final_address: Option<u16>,
    #[serde(skip)]
    words: Bytes,
}

impl Program {
    pub(crate) fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(instructions: Vec<Instruction>, words: Bytes) -> Self {
        let final_address = instructions.last().map(|instruction| instruction.address);
        Self {
            instructions,
            final_address,
            words,
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Address of the last instruction, `None` for an empty program.
    pub fn final_address(&self) -> Option<u16> {
        self.final_address
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Instruction frames as sent to the device.
    pub fn encoded(&self) -> &Bytes {
        &self.words
    }

    /// Cycles from address 0 to the end of the last instruction.
    pub fn total_cycles(&self) -> u64 {
        self.instructions.iter().map(|i| i.duration).sum()
    }

    /// Write the instructions, then a device-options frame carrying only
    /// the final address.
    pub fn upload<S: CommandSink>(&self, sink: &S) -> Result<(), UploadError> {
        let final_address = self
            .final_address
            .ok_or(UploadError::Compile(CompilerError::EmptyProgram))?;
        let options = Command::DeviceOptions(DeviceOptions::final_address(final_address))
            .to_bytes()
            .map_err(CompilerError::from)?;

        debug!(
            instructions = self.instructions.len(),
            bytes = self.words.len(),
            "uploading instructions"
        );
        sink.write_command(&self.words)
            .map_err(|err| UploadError::Sink(Box::new(err)))?;
        sink.write_command(&options)
            .map_err(|err| UploadError::Sink(Box::new(err)))?;
        info!(final_address, "program uploaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io;

    use ndpulsegen_wire::command::INSTRUCTION_LEN;
    use ndpulsegen_wire::decode_command;

    use super::*;
    use crate::{Compiler, Time, UpdateFlags};

    #[derive(Default)]
    struct RecordingSink {
        writes: RefCell<Vec<Vec<u8>>>,
    }

    impl CommandSink for RecordingSink {
        type Error = io::Error;

        fn write_command(&self, frames: &[u8]) -> io::Result<()> {
            self.writes.borrow_mut().push(frames.to_vec());
            Ok(())
        }
    }

    struct ClosedSink;

    impl CommandSink for ClosedSink {
        type Error = io::Error;

        fn write_command(&self, _frames: &[u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "port closed"))
        }
    }

    fn three_step() -> Compiler {
        let mut compiler = Compiler::new();
        for (t, level) in [(0u64, true), (4, false), (9, true)] {
            compiler
                .add_update(Time::cycles(t), [(3, level)], UpdateFlags::NONE)
                .unwrap();
        }
        compiler
    }

    #[test]
    fn upload_writes_instructions_then_final_address() {
        let sink = RecordingSink::default();
        let program = three_step().upload_instructions(&sink).unwrap();

        let writes = sink.writes.borrow();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].len(), 3 * INSTRUCTION_LEN);
        assert_eq!(&writes[0][..], &program.encoded()[..]);

        let addresses: Vec<u16> = writes[0]
            .chunks(INSTRUCTION_LEN)
            .map(|frame| match decode_command(frame).unwrap() {
                Command::Instruction(instruction) => instruction.address,
                other => panic!("unexpected command {other:?}"),
            })
            .collect();
        assert_eq!(addresses, vec![0, 1, 2]);

        assert_eq!(
            decode_command(&writes[1]).unwrap(),
            Command::DeviceOptions(DeviceOptions::final_address(2))
        );
    }

    #[test]
    fn empty_program_is_not_uploaded() {
        let sink = RecordingSink::default();
        let err = Compiler::new().upload_instructions(&sink).unwrap_err();
        assert!(matches!(err, UploadError::Compile(CompilerError::EmptyProgram)));
        assert!(sink.writes.borrow().is_empty());
    }

    #[test]
    fn sink_failure_is_reported() {
        let program = three_step().compile().unwrap();
        let err = program.upload(&ClosedSink).unwrap_err();
        assert!(matches!(err, UploadError::Sink(_)));
        assert!(err.to_string().contains("port closed"));
    }

    #[test]
    fn serializes_without_encoded_words() {
        let program = three_step().compile().unwrap();
        let json = serde_json::to_value(&program).unwrap();
        assert_eq!(json["final_address"], 2);
        assert_eq!(json["instructions"].as_array().unwrap().len(), 3);
        assert!(json.get("words").is_none());
        assert_eq!(program.total_cycles(), 10);
    }
}
