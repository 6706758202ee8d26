//! Object Descriptor Table
//!
//! An ODT is the content of one DAQ frame: up to seven payload bytes
//! packed from consecutive elements.

use ccp_proto::MAX_DAQ_PAYLOAD;
use serde_json::{Map, Value};

use crate::element::{is_valid_size, Element};
use crate::error::{DaqError, DaqResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Odt {
    /// Absolute ODT number, sent as the DAQ pid
    pub number: u8,
    pub can_id: u32,
    elements: Vec<Element>,
}

impl Odt {
    pub fn new(number: u8, can_id: u32) -> Self {
        Self {
            number,
            can_id,
            elements: Vec::new(),
        }
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Packed payload length in bytes
    pub fn len(&self) -> usize {
        self.elements.iter().map(Element::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Free payload bytes
    pub fn remaining(&self) -> usize {
        MAX_DAQ_PAYLOAD - self.len()
    }

    /// Put `element` at `slot`, replacing an existing element or appending.
    ///
    /// Nothing changes when the element does not fit.
    pub fn place(&mut self, slot: usize, element: Element) -> DaqResult<()> {
        if !is_valid_size(element.size) {
            return Err(DaqError::InvalidElementSize(element.size));
        }
        if slot > self.elements.len() {
            return Err(DaqError::ElementGap {
                slot,
                len: self.elements.len(),
            });
        }
        let replaced = self.elements.get(slot).map(Element::len).unwrap_or(0);
        let needed = self.len() - replaced + element.len();
        if needed > MAX_DAQ_PAYLOAD {
            return Err(DaqError::OdtOverflow {
                needed,
                max: MAX_DAQ_PAYLOAD,
            });
        }

        if slot == self.elements.len() {
            self.elements.push(element);
        } else {
            self.elements[slot] = element;
        }
        self.layout();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    fn layout(&mut self) {
        let mut bit_offset = 0;
        for element in &mut self.elements {
            element.bit_offset = bit_offset;
            bit_offset += element.len() * 8;
        }
    }

    /// Pack the current value of every element, in order
    pub fn sample<E>(
        &self,
        mut read: impl FnMut(&Element) -> Result<Vec<u8>, E>,
    ) -> Result<Vec<u8>, E> {
        let mut payload = Vec::with_capacity(self.len());
        for element in &self.elements {
            let mut bytes = read(element)?;
            bytes.resize(element.len(), 0);
            payload.extend_from_slice(&bytes);
        }
        Ok(payload)
    }

    /// Decode a DAQ payload into named values
    pub fn decode(&self, payload: &[u8]) -> DaqResult<Map<String, Value>> {
        if payload.len() < self.len() {
            return Err(DaqError::PayloadTooShort {
                expected: self.len(),
                actual: payload.len(),
            });
        }
        let mut values = Map::new();
        for element in &self.elements {
            let start = element.byte_offset();
            let value = element.decode(&payload[start..start + element.len()])?;
            values.insert(element.name.clone(), value);
        }
        Ok(values)
    }
}
