//! CRO payload layouts
//!
//! Each command documents the fields of its (up to six byte) payload.
//! The dispatcher derives the minimum payload length from the required
//! fields and `describe` renders a CRO for trace output.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::codes::CommandCode;

/// Byte order for multi-byte values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Big-endian (Motorola)
    Big,
    /// Little-endian (Intel), used by every multi-byte CRO field
    #[default]
    Little,
}

impl ByteOrder {
    /// Read an unsigned value of `bytes.len()` (at most 8) bytes
    pub fn read(self, bytes: &[u8]) -> u64 {
        let fold = |acc: u64, b: &u8| (acc << 8) | u64::from(*b);
        match self {
            ByteOrder::Big => bytes.iter().fold(0, fold),
            ByteOrder::Little => bytes.iter().rev().fold(0, fold),
        }
    }

    /// Write the low `len` bytes of `value`
    pub fn write(self, value: u64, len: usize) -> Vec<u8> {
        let le = value.to_le_bytes();
        let mut out: Vec<u8> = le.iter().take(len.min(8)).copied().collect();
        if self == ByteOrder::Big {
            out.reverse();
        }
        out
    }
}

/// One field of a CRO payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadField {
    pub name: &'static str,
    /// Offset within the payload (after command code and counter)
    pub offset: usize,
    pub len: usize,
    pub byte_order: ByteOrder,
    /// Trailing field a master may omit
    pub optional: bool,
}

impl PayloadField {
    const fn required(name: &'static str, offset: usize, len: usize) -> Self {
        Self {
            name,
            offset,
            len,
            byte_order: ByteOrder::Little,
            optional: false,
        }
    }

    const fn optional(name: &'static str, offset: usize, len: usize) -> Self {
        Self {
            name,
            offset,
            len,
            byte_order: ByteOrder::Little,
            optional: true,
        }
    }

    /// Bytes of this field within `payload`, truncated when the payload is short
    pub fn slice<'a>(&self, payload: &'a [u8]) -> &'a [u8] {
        let start = self.offset.min(payload.len());
        let end = (self.offset + self.len).min(payload.len());
        &payload[start..end]
    }

    /// Numeric value of the field
    pub fn value(&self, payload: &[u8]) -> u64 {
        self.byte_order.read(self.slice(payload))
    }
}

use PayloadField as F;

const CONNECT: &[PayloadField] = &[F::required("station_address", 0, 2)];
const GET_CCP_VERSION: &[PayloadField] =
    &[F::required("main_version", 0, 1), F::required("release", 1, 1)];
const EXCHANGE_ID: &[PayloadField] = &[F::optional("master_id", 0, 6)];
const SET_MTA: &[PayloadField] = &[
    F::required("address", 0, 4),
    F::required("extension", 4, 1),
    F::optional("mta_number", 5, 1),
];
const SIZED_DATA: &[PayloadField] = &[F::required("size", 0, 1), F::optional("data", 1, 5)];
const SIZE: &[PayloadField] = &[F::required("size", 0, 1)];
const DATA_6: &[PayloadField] = &[F::required("data", 0, 6)];
const GET_DAQ_SIZE: &[PayloadField] = &[
    F::required("daq_list", 0, 1),
    F::optional("reserved", 1, 1),
    F::optional("dto_id", 2, 4),
];
const SET_DAQ_PTR: &[PayloadField] = &[
    F::required("daq_list", 0, 1),
    F::required("odt", 1, 1),
    F::required("element", 2, 1),
];
const SIZED_ADDRESS: &[PayloadField] = &[
    F::required("size", 0, 1),
    F::required("extension", 1, 1),
    F::required("address", 2, 4),
];
const START_STOP: &[PayloadField] = &[
    F::required("mode", 0, 1),
    F::required("daq_list", 1, 1),
    F::required("last_odt", 2, 1),
    F::required("first_odt", 3, 1),
    F::required("prescaler", 4, 2),
];
const DISCONNECT: &[PayloadField] = &[
    F::required("temporary", 0, 1),
    F::optional("reserved", 1, 1),
    F::optional("station_address", 2, 2),
];
const RESOURCE: &[PayloadField] = &[F::required("resource", 0, 1)];
const KEY: &[PayloadField] = &[F::optional("key", 0, 6)];
const STATUS: &[PayloadField] = &[F::required("status", 0, 1)];
const BLOCK_SIZE: &[PayloadField] = &[F::required("size", 0, 4)];
const MODE: &[PayloadField] = &[F::required("mode", 0, 1)];
const SERVICE: &[PayloadField] = &[F::optional("service", 0, 2)];
const EMPTY: &[PayloadField] = &[];

impl CommandCode {
    /// Documented payload fields of this command
    pub fn layout(self) -> &'static [PayloadField] {
        match self {
            Self::Connect | Self::Test => CONNECT,
            Self::GetCcpVersion => GET_CCP_VERSION,
            Self::ExchangeId => EXCHANGE_ID,
            Self::SetMta => SET_MTA,
            Self::Dnload | Self::Program => SIZED_DATA,
            Self::Upload => SIZE,
            Self::Dnload6 | Self::Program6 => DATA_6,
            Self::GetDaqSize => GET_DAQ_SIZE,
            Self::SetDaqPtr => SET_DAQ_PTR,
            Self::WriteDaq | Self::ShortUp => SIZED_ADDRESS,
            Self::StartStop => START_STOP,
            Self::Disconnect => DISCONNECT,
            Self::GetSeed => RESOURCE,
            Self::Unlock => KEY,
            Self::SetSStatus => STATUS,
            Self::BuildChksum | Self::ClearMemory | Self::Move => BLOCK_SIZE,
            Self::StartStopAll => MODE,
            Self::DiagService | Self::ActionService => SERVICE,
            Self::SelectCalPage | Self::GetSStatus | Self::GetActiveCalPage => EMPTY,
        }
    }

    /// Shortest payload that carries every required field
    pub fn min_payload_len(self) -> usize {
        self.layout()
            .iter()
            .filter(|f| !f.optional)
            .map(|f| f.offset + f.len)
            .max()
            .unwrap_or(0)
    }

    /// Look up a field by name
    pub fn field(self, name: &str) -> Option<&'static PayloadField> {
        self.layout().iter().find(|f| f.name == name)
    }
}

/// Render a CRO payload field by field, e.g. `SET_MTA address=0x00001000 extension=0x00`
pub fn describe(code: CommandCode, payload: &[u8]) -> String {
    let mut out = code.name().to_string();
    for field in code.layout() {
        let bytes = field.slice(payload);
        if bytes.is_empty() {
            continue;
        }
        let _ = if field.len > 4 {
            write!(out, " {}={}", field.name, hex::encode(bytes))
        } else {
            write!(
                out,
                " {}=0x{:0width$X}",
                field.name,
                field.byte_order.read(bytes),
                width = bytes.len() * 2
            )
        };
    }
    out
}
