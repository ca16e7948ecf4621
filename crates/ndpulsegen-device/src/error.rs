use std::time::Duration;

/// Errors that can occur while talking to a device.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] ndpulsegen_transport::TransportError),

    /// Framing or stream error.
    #[error("wire error: {0}")]
    Wire(#[from] ndpulsegen_wire::WireError),

    /// A command could not be encoded.
    #[error("encode error: {0}")]
    Codec(#[from] ndpulsegen_wire::CodecError),

    /// No port is open.
    #[error("not connected")]
    NotConnected,

    /// No port matched the connection target.
    #[error("no device found for {0}")]
    NoDeviceFound(String),

    /// The port did not answer the echo probe as a pulse generator.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// A reply did not arrive in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The background reader thread could not be started.
    #[error("failed to spawn reader thread: {0}")]
    ReaderSpawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
