//! Error taxonomy shared by the transport, the command API and the operator
//! protocol

use thiserror::Error;

/// Faults detected while building a request or validating a response frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Response too short: {0} bytes")]
    ShortFrame(usize),

    #[error("Unexpected echo 0x{echo:02X} for command 0x{code:02X}")]
    UnexpectedEcho { code: u8, echo: u8 },

    #[error("Checksum mismatch: received 0x{received:02X}, calculated 0x{calculated:02X}")]
    ChecksumMismatch { received: u8, calculated: u8 },

    #[error("Reply payload of {len} bytes exceeds capacity of {capacity}")]
    BufferTooSmall { len: usize, capacity: usize },

    #[error("Request frame of {0} bytes exceeds the frame limit")]
    FrameTooLarge(usize),

    #[error("Malformed payload for command 0x{code:02X}: {len} bytes")]
    MalformedPayload { code: u8, len: usize },
}

/// Errors surfaced by every filter operation and rendered on `:NACK:` lines
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Malformed or out-of-range operator input; never touches the bus
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Bus write or read failure
    #[error("Bus transfer failed: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The device answered with its error echo
    #[error("Device reported error code {0}")]
    Device(u8),
}

impl FilterError {
    /// Stable name used on operator NACK lines
    pub fn name(&self) -> &'static str {
        match self {
            FilterError::Argument(_) => "ArgumentError",
            FilterError::Transport(_) => "TransportError",
            FilterError::Protocol(_) => "ProtocolError",
            FilterError::Device(_) => "DeviceError",
        }
    }

    pub fn argument(message: impl Into<String>) -> Self {
        FilterError::Argument(message.into())
    }
}
