//! Host bridge errors.

use lgw_bridge::protocol::hex::HexError;
use thiserror::Error;

/// Errors reported by the host side of the bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),

    /// No answer header within the retry budget
    #[error("no answer header after {0} reads, device deadlocked")]
    Deadlock(u32),

    #[error("answer body stalled after {received} of {expected} bytes")]
    BodyTimeout { received: usize, expected: usize },

    /// Declared answer length does not fit the receive buffer
    #[error("answer declares {len} bytes, buffer holds {capacity}")]
    MalformedSize { len: usize, capacity: usize },

    #[error("request of {len} bytes exceeds the {limit} byte limit")]
    RequestTooLarge { len: usize, limit: usize },

    #[error("'{0}' rejected by device")]
    Nack(char),

    #[error("'{0}' not supported by device")]
    Unsupported(char),

    #[error("expected '{expected}' answer, got {got:#04x}")]
    UnexpectedAnswer { expected: char, got: u8 },

    #[error("expected {expected} answer bytes, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("packet answer trailer missing")]
    TrailerMismatch,

    #[error("malformed packet answer: {0}")]
    MalformedPackets(&'static str),

    #[error("TX request of {0} bytes does not hold metadata and payload")]
    InvalidTxRequest(usize),

    #[error("firmware version mismatch, host expects {expected:#010x}")]
    FirmwareMismatch { expected: u32, unique_id: [u8; 8] },

    #[error("request encoding failed: {0:?}")]
    Encoding(HexError),

    #[error("no bridge device found")]
    NoDevice,

    /// Another caller panicked while holding the bridge
    #[error("bridge lock poisoned")]
    Poisoned,
}

impl From<HexError> for BridgeError {
    fn from(e: HexError) -> Self {
        BridgeError::Encoding(e)
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
