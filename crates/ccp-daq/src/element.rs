//! Memory-mapped measurement element
//!
//! An element names a 1, 2 or 4 byte value at an absolute address and
//! carries the conversion needed to turn its raw bytes into a physical
//! value: `physical = raw * scale + offset`.

use std::collections::BTreeMap;

use ccp_proto::ByteOrder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DaqError, DaqResult};

/// Single measurement placed in an ODT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,

    /// Position within the owning ODT payload, in bits
    #[serde(skip)]
    pub bit_offset: usize,

    /// Size in bytes (1, 2 or 4)
    pub size: u8,

    pub address: u32,

    #[serde(default)]
    pub extension: u8,

    #[serde(default)]
    pub byte_order: ByteOrder,

    #[serde(default)]
    pub signed: bool,

    /// Scale factor: physical = raw * scale + offset
    #[serde(default = "default_scale")]
    pub scale: f64,

    #[serde(default)]
    pub offset: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Discrete value names, keyed by raw value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<BTreeMap<i64, String>>,
}

fn default_scale() -> f64 {
    1.0
}

/// Element sizes a DAQ list accepts
pub fn is_valid_size(size: u8) -> bool {
    matches!(size, 1 | 2 | 4)
}

impl Element {
    /// Raw unsigned element named after its location
    pub fn new(address: u32, extension: u8, size: u8) -> DaqResult<Self> {
        if !is_valid_size(size) {
            return Err(DaqError::InvalidElementSize(size));
        }
        Ok(Self {
            name: format!("0x{:02X}:0x{:08X}", extension, address),
            bit_offset: 0,
            size,
            address,
            extension,
            byte_order: ByteOrder::default(),
            signed: false,
            scale: 1.0,
            offset: 0.0,
            min: None,
            max: None,
            unit: None,
            choices: None,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    pub fn with_scale(mut self, scale: f64, offset: f64) -> Self {
        self.scale = scale;
        self.offset = offset;
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_choices(mut self, choices: impl IntoIterator<Item = (i64, String)>) -> Self {
        self.choices = Some(choices.into_iter().collect());
        self
    }

    pub fn len(&self) -> usize {
        usize::from(self.size)
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Position within the owning ODT payload, in bytes
    pub fn byte_offset(&self) -> usize {
        self.bit_offset / 8
    }

    /// Same memory location (address and extension)
    pub fn is_at(&self, address: u32, extension: u8) -> bool {
        self.address == address && self.extension == extension
    }

    /// Copy of this element's metadata placed at a different size
    pub fn resized(&self, size: u8) -> DaqResult<Self> {
        if !is_valid_size(size) {
            return Err(DaqError::InvalidElementSize(size));
        }
        Ok(Self {
            size,
            ..self.clone()
        })
    }

    /// Raw integer value, sign-extended when the element is signed
    pub fn raw_value(&self, bytes: &[u8]) -> DaqResult<i64> {
        if bytes.len() < self.len() {
            return Err(DaqError::PayloadTooShort {
                expected: self.len(),
                actual: bytes.len(),
            });
        }
        let unsigned = self.byte_order.read(&bytes[..self.len()]);
        if self.signed {
            let shift = 64 - 8 * self.len() as u32;
            Ok(((unsigned << shift) as i64) >> shift)
        } else {
            Ok(unsigned as i64)
        }
    }

    /// Physical value of a raw integer
    pub fn physical(&self, raw: i64) -> f64 {
        raw as f64 * self.scale + self.offset
    }

    /// Decoded value: the choice name when one matches, else the physical number
    pub fn decode(&self, bytes: &[u8]) -> DaqResult<Value> {
        let raw = self.raw_value(bytes)?;
        if let Some(name) = self.choices.as_ref().and_then(|c| c.get(&raw)) {
            return Ok(Value::String(name.clone()));
        }
        let physical = self.physical(raw);
        if self.scale.fract() == 0.0 && self.offset.fract() == 0.0 {
            Ok(Value::from(physical as i64))
        } else {
            Ok(serde_json::Number::from_f64(physical)
                .map(Value::Number)
                .unwrap_or(Value::Null))
        }
    }

    /// Raw bytes for a physical value, clamped to the element range
    pub fn encode(&self, physical: f64) -> Vec<u8> {
        let mut value = physical;
        if let Some(min) = self.min {
            value = value.max(min);
        }
        if let Some(max) = self.max {
            value = value.min(max);
        }
        let raw = ((value - self.offset) / self.scale).round();
        let bits = 8 * self.len() as u32;
        let raw = if self.signed {
            let limit = (1i64 << (bits - 1)) as f64;
            (raw.clamp(-limit, limit - 1.0) as i64) as u64
        } else {
            let limit = ((1u64 << bits) - 1) as f64;
            raw.clamp(0.0, limit) as u64
        };
        self.byte_order.write(raw, self.len())
    }
}
