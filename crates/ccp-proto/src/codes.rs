//! CCP command codes, return codes and protocol bit masks

use std::fmt;

use serde::{Deserialize, Serialize};

/// CCP version implemented by the slave (main, release)
pub const CCP_VERSION: (u8, u8) = (2, 1);

/// CAN data field size
pub const MAX_FRAME_LEN: usize = 8;
/// CRO payload budget (frame minus command code and counter)
pub const MAX_CRO_PAYLOAD: usize = 6;
/// CRM payload budget (frame minus pid, return code and counter)
pub const MAX_CRM_PAYLOAD: usize = 5;
/// DAQ DTO payload budget (frame minus pid)
pub const MAX_DAQ_PAYLOAD: usize = 7;

/// DTO packet identifiers for non-DAQ messages
pub mod dto_type {
    pub const COMMAND_RETURN_MESSAGE: u8 = 0xFF;
    pub const EVENT_MESSAGE: u8 = 0xFE;
}

/// SET_S_STATUS / GET_S_STATUS bits
pub mod session_status {
    /// Calibration data initialized
    pub const CAL: u8 = 0x01;
    /// DAQ lists initialized
    pub const DAQ: u8 = 0x02;
    /// Resume session after temporary disconnect
    pub const RESUME: u8 = 0x04;
    /// Save calibration data during shutdown
    pub const STORE: u8 = 0x40;
    /// Session in progress
    pub const RUN: u8 = 0x80;
}

/// CCP command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum CommandCode {
    // Mandatory commands
    Connect = 0x01,
    GetCcpVersion = 0x1B,
    ExchangeId = 0x17,
    SetMta = 0x02,
    Dnload = 0x03,
    Upload = 0x04,
    GetDaqSize = 0x14,
    SetDaqPtr = 0x15,
    WriteDaq = 0x16,
    StartStop = 0x06,
    Disconnect = 0x07,

    // Optional commands
    GetSeed = 0x12,
    Unlock = 0x13,
    #[serde(rename = "DNLOAD_6")]
    Dnload6 = 0x23,
    ShortUp = 0x0F,
    SelectCalPage = 0x11,
    SetSStatus = 0x0C,
    GetSStatus = 0x0D,
    BuildChksum = 0x0E,
    ClearMemory = 0x10,
    Program = 0x18,
    #[serde(rename = "PROGRAM_6")]
    Program6 = 0x22,
    Move = 0x19,
    Test = 0x05,
    GetActiveCalPage = 0x09,
    StartStopAll = 0x08,
    DiagService = 0x20,
    ActionService = 0x21,
}

impl CommandCode {
    /// Every defined command, mandatory ones first
    pub const ALL: [CommandCode; 28] = [
        Self::Connect,
        Self::GetCcpVersion,
        Self::ExchangeId,
        Self::SetMta,
        Self::Dnload,
        Self::Upload,
        Self::GetDaqSize,
        Self::SetDaqPtr,
        Self::WriteDaq,
        Self::StartStop,
        Self::Disconnect,
        Self::GetSeed,
        Self::Unlock,
        Self::Dnload6,
        Self::ShortUp,
        Self::SelectCalPage,
        Self::SetSStatus,
        Self::GetSStatus,
        Self::BuildChksum,
        Self::ClearMemory,
        Self::Program,
        Self::Program6,
        Self::Move,
        Self::Test,
        Self::GetActiveCalPage,
        Self::StartStopAll,
        Self::DiagService,
        Self::ActionService,
    ];

    /// Mandatory commands must be implemented by every CCP slave
    pub fn is_mandatory(self) -> bool {
        matches!(
            self,
            Self::Connect
                | Self::GetCcpVersion
                | Self::ExchangeId
                | Self::SetMta
                | Self::Dnload
                | Self::Upload
                | Self::GetDaqSize
                | Self::SetDaqPtr
                | Self::WriteDaq
                | Self::StartStop
                | Self::Disconnect
        )
    }

    /// Commands a slave answers while no session is connected
    pub fn answered_while_disconnected(self) -> bool {
        matches!(self, Self::Connect | Self::GetCcpVersion)
    }

    /// Protocol name of the command (e.g. `GET_CCP_VERSION`)
    pub fn name(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::GetCcpVersion => "GET_CCP_VERSION",
            Self::ExchangeId => "EXCHANGE_ID",
            Self::SetMta => "SET_MTA",
            Self::Dnload => "DNLOAD",
            Self::Upload => "UPLOAD",
            Self::GetDaqSize => "GET_DAQ_SIZE",
            Self::SetDaqPtr => "SET_DAQ_PTR",
            Self::WriteDaq => "WRITE_DAQ",
            Self::StartStop => "START_STOP",
            Self::Disconnect => "DISCONNECT",
            Self::GetSeed => "GET_SEED",
            Self::Unlock => "UNLOCK",
            Self::Dnload6 => "DNLOAD_6",
            Self::ShortUp => "SHORT_UP",
            Self::SelectCalPage => "SELECT_CAL_PAGE",
            Self::SetSStatus => "SET_S_STATUS",
            Self::GetSStatus => "GET_S_STATUS",
            Self::BuildChksum => "BUILD_CHKSUM",
            Self::ClearMemory => "CLEAR_MEMORY",
            Self::Program => "PROGRAM",
            Self::Program6 => "PROGRAM_6",
            Self::Move => "MOVE",
            Self::Test => "TEST",
            Self::GetActiveCalPage => "GET_ACTIVE_CAL_PAGE",
            Self::StartStopAll => "START_STOP_ALL",
            Self::DiagService => "DIAG_SERVICE",
            Self::ActionService => "ACTION_SERVICE",
        }
    }

    /// Resource whose protection gates this command, if any
    pub fn protected_by(self) -> Option<Resource> {
        match self {
            Self::Dnload | Self::Dnload6 | Self::SelectCalPage => Some(Resource::Cal),
            Self::GetDaqSize
            | Self::SetDaqPtr
            | Self::WriteDaq
            | Self::StartStop
            | Self::StartStopAll => Some(Resource::Daq),
            Self::ClearMemory | Self::Program | Self::Program6 => Some(Resource::Pgm),
            _ => None,
        }
    }
}

impl TryFrom<u8> for CommandCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|code| *code as u8 == value)
            .ok_or(value)
    }
}

impl From<CommandCode> for u8 {
    fn from(code: CommandCode) -> Self {
        code as u8
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Severity class of a non-acknowledge return code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Advisory, no action required
    C0,
    /// Busy or pending, master waits and retries
    C1,
    /// Slave requests a master-driven reinitialization
    C2,
    /// Command rejected
    C3,
}

impl ErrorClass {
    /// Expected master reaction
    pub fn action(self) -> &'static str {
        match self {
            Self::C0 => "none",
            Self::C1 => "wait until ACK or timeout",
            Self::C2 => "reinitialize",
            Self::C3 => "fault",
        }
    }
}

/// CCP command return codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReturnCode {
    Acknowledge = 0x00,

    // C0
    DaqProcessorOverload = 0x01,

    // C1
    CommandProcessorBusy = 0x10,
    DaqProcessorBusy = 0x11,
    InternalTimeout = 0x12,
    KeyRequest = 0x18,
    SessionStatusRequest = 0x19,

    // C2
    ColdStartRequest = 0x20,
    CalDataInitRequest = 0x21,
    DaqListInitRequest = 0x22,
    CodeUpdateRequest = 0x23,

    // C3
    UnknownCommand = 0x30,
    CommandSyntax = 0x31,
    ParameterOutOfRange = 0x32,
    AccessDenied = 0x33,
    Overload = 0x34,
    AccessLocked = 0x35,
    ResourceFunctionNotAvailable = 0x36,
}

impl ReturnCode {
    /// Severity class, `None` for ACKNOWLEDGE
    pub fn class(self) -> Option<ErrorClass> {
        match self {
            Self::Acknowledge => None,
            Self::DaqProcessorOverload => Some(ErrorClass::C0),
            Self::CommandProcessorBusy
            | Self::DaqProcessorBusy
            | Self::InternalTimeout
            | Self::KeyRequest
            | Self::SessionStatusRequest => Some(ErrorClass::C1),
            Self::ColdStartRequest
            | Self::CalDataInitRequest
            | Self::DaqListInitRequest
            | Self::CodeUpdateRequest => Some(ErrorClass::C2),
            Self::UnknownCommand
            | Self::CommandSyntax
            | Self::ParameterOutOfRange
            | Self::AccessDenied
            | Self::Overload
            | Self::AccessLocked
            | Self::ResourceFunctionNotAvailable => Some(ErrorClass::C3),
        }
    }

    pub fn is_acknowledge(self) -> bool {
        self == Self::Acknowledge
    }
}

impl TryFrom<u8> for ReturnCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Acknowledge),
            0x01 => Ok(Self::DaqProcessorOverload),
            0x10 => Ok(Self::CommandProcessorBusy),
            0x11 => Ok(Self::DaqProcessorBusy),
            0x12 => Ok(Self::InternalTimeout),
            0x18 => Ok(Self::KeyRequest),
            0x19 => Ok(Self::SessionStatusRequest),
            0x20 => Ok(Self::ColdStartRequest),
            0x21 => Ok(Self::CalDataInitRequest),
            0x22 => Ok(Self::DaqListInitRequest),
            0x23 => Ok(Self::CodeUpdateRequest),
            0x30 => Ok(Self::UnknownCommand),
            0x31 => Ok(Self::CommandSyntax),
            0x32 => Ok(Self::ParameterOutOfRange),
            0x33 => Ok(Self::AccessDenied),
            0x34 => Ok(Self::Overload),
            0x35 => Ok(Self::AccessLocked),
            0x36 => Ok(Self::ResourceFunctionNotAvailable),
            other => Err(other),
        }
    }
}

impl From<ReturnCode> for u8 {
    fn from(code: ReturnCode) -> Self {
        code as u8
    }
}

impl fmt::UpperHex for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&(*self as u8), f)
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Acknowledge => "ACKNOWLEDGE",
            Self::DaqProcessorOverload => "DAQ_PROCESSOR_OVERLOAD",
            Self::CommandProcessorBusy => "COMMAND_PROCESSOR_BUSY",
            Self::DaqProcessorBusy => "DAQ_PROCESSOR_BUSY",
            Self::InternalTimeout => "INTERNAL_TIMEOUT",
            Self::KeyRequest => "KEY_REQUEST",
            Self::SessionStatusRequest => "SESSION_STATUS_REQUEST",
            Self::ColdStartRequest => "COLD_START_REQUEST",
            Self::CalDataInitRequest => "CAL_DATA_INIT_REQUEST",
            Self::DaqListInitRequest => "DAQ_LIST_INIT_REQUEST",
            Self::CodeUpdateRequest => "CODE_UPDATE_REQUEST",
            Self::UnknownCommand => "UNKNOWN_COMMAND",
            Self::CommandSyntax => "COMMAND_SYNTAX",
            Self::ParameterOutOfRange => "PARAMETER_OUT_OF_RANGE",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::Overload => "OVERLOAD",
            Self::AccessLocked => "ACCESS_LOCKED",
            Self::ResourceFunctionNotAvailable => "RESOURCE_FUNCTION_NOT_AVAILABLE",
        };
        f.write_str(name)
    }
}

/// Protectable slave resources (seed & key)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    /// Calibration
    Cal,
    /// Data acquisition
    Daq,
    /// Flash programming
    Pgm,
}

impl Resource {
    pub const ALL: [Resource; 3] = [Self::Cal, Self::Daq, Self::Pgm];

    /// Bit of this resource in a resource mask
    pub fn bit(self) -> u8 {
        match self {
            Self::Cal => 0x01,
            Self::Daq => 0x02,
            Self::Pgm => 0x40,
        }
    }

    /// Resource named by a mask with exactly one known bit set
    pub fn from_mask(mask: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.bit() == mask)
    }
}

/// Set of resources encoded as the CCP resource mask byte
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ResourceMask(u8);

impl ResourceMask {
    pub const EMPTY: ResourceMask = ResourceMask(0);

    pub fn all() -> Self {
        Self::from_resources(Resource::ALL)
    }

    pub fn from_resources(resources: impl IntoIterator<Item = Resource>) -> Self {
        Self(resources.into_iter().fold(0, |acc, r| acc | r.bit()))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, resource: Resource) -> bool {
        self.0 & resource.bit() != 0
    }

    pub fn insert(&mut self, resource: Resource) {
        self.0 |= resource.bit();
    }

    pub fn remove(&mut self, resource: Resource) {
        self.0 &= !resource.bit();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// START_STOP mode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStopMode {
    Stop = 0x00,
    Start = 0x01,
    /// Arm the list for a later synchronized START_STOP_ALL
    Prepare = 0x02,
}

impl TryFrom<u8> for StartStopMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Stop),
            0x01 => Ok(Self::Start),
            0x02 => Ok(Self::Prepare),
            other => Err(other),
        }
    }
}
