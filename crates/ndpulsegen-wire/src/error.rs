/// Errors raised while encoding or decoding a single message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// A field value does not fit its wire width or domain.
    #[error("{field} out of range ({value}, max {max})")]
    FieldOutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },

    /// An instruction must last at least one clock cycle.
    #[error("instruction duration must be at least one cycle")]
    ZeroDuration,

    /// A buffer does not have the fixed length its message requires.
    #[error("{what}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The id byte does not name a known command.
    #[error("unknown command id {0}")]
    UnknownCommand(u8),

    /// An enumerated field carries an undefined discriminant.
    #[error("invalid {field} value {value}")]
    InvalidEnum { field: &'static str, value: u8 },
}

/// Errors that can occur while reading or writing framed messages.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Message encoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// An I/O error occurred while reading or writing frames.
    #[error("wire I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream reached end of file.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;

pub type Result<T> = std::result::Result<T, WireError>;
