use ndpulsegen_wire::CodecError;

/// Errors raised while building or compiling a timeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompilerError {
    /// The pulse flags mode is not one of `start`, `every`, `end`.
    #[error("unknown flags mode '{0}' (expected start, every or end)")]
    UnknownFlagsMode(String),

    /// A pulse must hold its active level for at least one cycle.
    #[error("pulse active duration must be at least one cycle")]
    ZeroActiveDuration,

    /// A repeating pulse needs a non-zero idle phase between repetitions.
    #[error("pulse repeated {count} times needs a non-zero idle duration")]
    ZeroIdleDuration { count: u32 },

    /// The sequence must end after the last scheduled event.
    #[error("sequence duration {duration} must exceed last event time {last_event}")]
    SequenceTooShort { duration: u64, last_event: u64 },

    /// Channel index outside 0..24.
    #[error("channel {0} out of range (0..24)")]
    ChannelOutOfRange(usize),

    /// A time in seconds that is negative, not finite, or too large.
    #[error("invalid time {0} s")]
    InvalidTime(f64),

    /// Time arithmetic overflowed the cycle counter.
    #[error("time overflows the cycle counter")]
    TimeOverflow,

    /// A goto takes effect at the end of cycle `t_from - 1`, so `t_from` must be positive.
    #[error("goto cannot take effect before time 0")]
    GotoAtTimeZero,

    /// A goto target time has no instruction address.
    #[error("goto target {target} has no address")]
    MissingGotoTarget { target: u64 },

    /// An empty program cannot be uploaded.
    #[error("program is empty")]
    EmptyProgram,

    /// An instruction field does not fit the wire format.
    #[error("encode error: {0}")]
    Encode(#[from] CodecError),
}

/// Errors raised while uploading a program to a device.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The program could not be compiled or encoded.
    #[error("compile error: {0}")]
    Compile(#[from] CompilerError),

    /// The device connection rejected the write.
    #[error("upload failed: {0}")]
    Sink(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, CompilerError>;
