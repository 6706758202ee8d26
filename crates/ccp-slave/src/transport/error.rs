//! CAN transport errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("CAN interface unavailable: {0}")]
    ConnectionFailed(String),

    #[error("CAN interface closed")]
    ConnectionClosed,

    /// Transmit queue full, frame dropped
    #[error("Transmit queue busy")]
    Busy,

    #[error("Frame not sent: {0}")]
    SendFailed(String),

    #[error("Frame not received: {0}")]
    ReceiveFailed(String),

    /// Frame that cannot be put on the bus (id or length)
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
}
