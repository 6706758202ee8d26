//! Frame codec errors

use thiserror::Error;

/// Errors raised while encoding or decoding CCP frames
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtoError {
    /// Frame shorter than the fixed header of its type
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    /// Frame or payload exceeds the CAN data field budget
    #[error("payload too long: at most {max} bytes allowed, got {actual}")]
    TooLong { max: usize, actual: usize },

    /// Byte is not a defined return code
    #[error("unknown return code: 0x{0:02X}")]
    UnknownReturnCode(u8),

    /// Pid is reserved for CRM/event messages and cannot name an ODT
    #[error("pid 0x{0:02X} is reserved and cannot carry DAQ data")]
    ReservedPid(u8),
}

/// Result type for frame codec operations
pub type ProtoResult<T> = Result<T, ProtoError>;
