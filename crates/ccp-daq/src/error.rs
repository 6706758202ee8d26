//! DAQ configuration errors

use ccp_proto::ReturnCode;
use thiserror::Error;

/// Errors raised while configuring or decoding DAQ lists
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DaqError {
    #[error("unknown DAQ list: {0}")]
    UnknownList(u8),

    #[error("DAQ list {list} has no ODT {odt}")]
    UnknownOdt { list: u8, odt: u8 },

    #[error("element index {0} exceeds ODT capacity")]
    ElementIndex(u8),

    #[error("invalid element size: {0} (expected 1, 2 or 4)")]
    InvalidElementSize(u8),

    /// Element write would leave an empty slot before it
    #[error("element slot {slot} leaves a gap after {len} elements")]
    ElementGap { slot: usize, len: usize },

    #[error("ODT overflow: {needed} bytes needed, {max} available")]
    OdtOverflow { needed: usize, max: usize },

    #[error("DAQ pointer not set")]
    NoPointer,

    #[error("DAQ list {0} is running")]
    ListRunning(u8),

    #[error("invalid ODT range {first}..={last} for {count} ODTs")]
    InvalidOdtRange { first: u8, last: u8, count: usize },

    #[error("prescaler must be at least 1")]
    ZeroPrescaler,

    #[error("DAQ payload too short: expected {expected} bytes, got {actual}")]
    PayloadTooShort { expected: usize, actual: usize },

    #[error("no ODT with pid 0x{0:02X}")]
    UnknownPid(u8),
}

impl DaqError {
    /// Return code reported to the master
    pub fn return_code(&self) -> ReturnCode {
        match self {
            DaqError::ListRunning(_) => ReturnCode::DaqProcessorBusy,
            _ => ReturnCode::ParameterOutOfRange,
        }
    }
}

/// Result type for DAQ operations
pub type DaqResult<T> = Result<T, DaqError>;
