//! DAQ lists and the table the master configures them through
//!
//! The set of lists and their ODT counts is fixed slave configuration.
//! The master fills ODTs element by element through the write pointer
//! (SET_DAQ_PTR / WRITE_DAQ) and then starts transmission.

use ccp_proto::{DaqDto, MAX_DAQ_PAYLOAD};
use serde_json::{Map, Value};

use crate::element::Element;
use crate::error::{DaqError, DaqResult};
use crate::odt::Odt;

/// Transmission state of a DAQ list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListMode {
    #[default]
    Stopped,
    /// Prepared for a synchronized start
    Armed,
    Running,
}

/// ODT range and rate of a list, period = prescaler * base cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transmission {
    pub first_odt: u8,
    pub last_odt: u8,
    pub prescaler: u16,
}

impl Transmission {
    /// Every ODT of a list with `odt_count` ODTs at prescaler 1
    pub fn full_range(odt_count: usize) -> Self {
        Self {
            first_odt: 0,
            last_odt: odt_count.saturating_sub(1) as u8,
            prescaler: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DaqList {
    pub number: u8,
    pub first_pid: u8,
    pub can_id: u32,
    /// Frame id from configuration, restored on clear
    default_can_id: u32,
    odts: Vec<Odt>,
    mode: ListMode,
    transmission: Option<Transmission>,
}

impl DaqList {
    /// List with `odt_count` empty ODTs numbered from `first_pid`
    pub fn new(number: u8, first_pid: u8, odt_count: u8, can_id: u32) -> Self {
        let odts = (0..odt_count)
            .map(|i| Odt::new(first_pid.wrapping_add(i), can_id))
            .collect();
        Self {
            number,
            first_pid,
            can_id,
            default_can_id: can_id,
            odts,
            mode: ListMode::Stopped,
            transmission: None,
        }
    }

    pub fn odt_count(&self) -> usize {
        self.odts.len()
    }

    /// Payload bytes available across all ODTs
    pub fn capacity(&self) -> usize {
        self.odts.len() * MAX_DAQ_PAYLOAD
    }

    pub fn odts(&self) -> &[Odt] {
        &self.odts
    }

    pub fn odt(&self, index: u8) -> DaqResult<&Odt> {
        self.odts.get(usize::from(index)).ok_or(DaqError::UnknownOdt {
            list: self.number,
            odt: index,
        })
    }

    fn odt_mut(&mut self, index: u8) -> DaqResult<&mut Odt> {
        let list = self.number;
        self.odts
            .get_mut(usize::from(index))
            .ok_or(DaqError::UnknownOdt { list, odt: index })
    }

    pub fn mode(&self) -> ListMode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.mode == ListMode::Running
    }

    pub fn transmission(&self) -> Option<Transmission> {
        self.transmission
    }

    pub fn has_elements(&self) -> bool {
        self.odts.iter().any(|odt| !odt.is_empty())
    }

    /// Move every ODT to a new frame id
    pub fn set_can_id(&mut self, can_id: u32) {
        self.can_id = can_id;
        for odt in &mut self.odts {
            odt.can_id = can_id;
        }
    }

    /// Stop the list and drop every element and transmission parameter
    pub fn clear(&mut self) {
        for odt in &mut self.odts {
            odt.clear();
        }
        self.mode = ListMode::Stopped;
        self.transmission = None;
    }

    /// Back to the configured frame id
    pub fn reset_can_id(&mut self) {
        self.set_can_id(self.default_can_id);
    }

    pub fn validate_transmission(
        &self,
        first_odt: u8,
        last_odt: u8,
        prescaler: u16,
    ) -> DaqResult<Transmission> {
        if prescaler == 0 {
            return Err(DaqError::ZeroPrescaler);
        }
        if first_odt > last_odt || usize::from(last_odt) >= self.odts.len() {
            return Err(DaqError::InvalidOdtRange {
                first: first_odt,
                last: last_odt,
                count: self.odts.len(),
            });
        }
        Ok(Transmission {
            first_odt,
            last_odt,
            prescaler,
        })
    }

    pub fn start(&mut self, transmission: Transmission) {
        self.transmission = Some(transmission);
        self.mode = ListMode::Running;
    }

    pub fn arm(&mut self, transmission: Transmission) {
        self.transmission = Some(transmission);
        self.mode = ListMode::Armed;
    }

    /// Stop transmission, keeping the configuration
    pub fn stop(&mut self) {
        self.mode = ListMode::Stopped;
    }

    /// Armed or previous parameters, else the full ODT range at prescaler 1
    pub fn resume_transmission(&self) -> Transmission {
        self.transmission
            .unwrap_or_else(|| Transmission::full_range(self.odts.len()))
    }

    /// Copy of the non-empty ODTs in the transmission range
    pub fn snapshot(&self) -> Vec<Odt> {
        let range = self.resume_transmission();
        self.odts
            .iter()
            .skip(usize::from(range.first_odt))
            .take(usize::from(range.last_odt - range.first_odt) + 1)
            .filter(|odt| !odt.is_empty())
            .cloned()
            .collect()
    }
}

/// Write cursor for WRITE_DAQ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaqPointer {
    pub list: u8,
    pub odt: u8,
    pub element: u8,
}

/// All DAQ lists of a slave plus the write pointer
#[derive(Debug, Clone, Default)]
pub struct DaqTable {
    lists: Vec<DaqList>,
    pointer: Option<DaqPointer>,
}

impl DaqTable {
    pub fn new(lists: Vec<DaqList>) -> Self {
        Self {
            lists,
            pointer: None,
        }
    }

    pub fn lists(&self) -> &[DaqList] {
        &self.lists
    }

    pub fn lists_mut(&mut self) -> impl Iterator<Item = &mut DaqList> {
        self.lists.iter_mut()
    }

    pub fn list(&self, number: u8) -> DaqResult<&DaqList> {
        self.lists
            .iter()
            .find(|l| l.number == number)
            .ok_or(DaqError::UnknownList(number))
    }

    pub fn list_mut(&mut self, number: u8) -> DaqResult<&mut DaqList> {
        self.lists
            .iter_mut()
            .find(|l| l.number == number)
            .ok_or(DaqError::UnknownList(number))
    }

    pub fn pointer(&self) -> Option<DaqPointer> {
        self.pointer
    }

    /// Validate and move the write pointer
    pub fn set_pointer(&mut self, list: u8, odt: u8, element: u8) -> DaqResult<()> {
        self.list(list)?.odt(odt)?;
        if usize::from(element) >= MAX_DAQ_PAYLOAD {
            return Err(DaqError::ElementIndex(element));
        }
        self.pointer = Some(DaqPointer { list, odt, element });
        Ok(())
    }

    /// Place an element at the pointer and advance it
    pub fn write(&mut self, element: Element) -> DaqResult<()> {
        let pointer = self.pointer.ok_or(DaqError::NoPointer)?;
        let list = self.list_mut(pointer.list)?;
        if list.is_running() {
            return Err(DaqError::ListRunning(pointer.list));
        }
        list.odt_mut(pointer.odt)?
            .place(usize::from(pointer.element), element)?;
        self.pointer = Some(DaqPointer {
            element: pointer.element.saturating_add(1),
            ..pointer
        });
        Ok(())
    }

    /// Clear one list, dropping the pointer if it points into it
    pub fn clear_list(&mut self, number: u8) -> DaqResult<&mut DaqList> {
        if self.pointer.is_some_and(|p| p.list == number) {
            self.pointer = None;
        }
        let list = self.list_mut(number)?;
        list.clear();
        Ok(list)
    }

    /// Clear every list, restore configured frame ids and forget the pointer
    pub fn clear(&mut self) {
        for list in &mut self.lists {
            list.clear();
            list.reset_can_id();
        }
        self.pointer = None;
    }

    pub fn stop_all(&mut self) {
        for list in &mut self.lists {
            list.stop();
        }
    }

    /// ODT owning a DAQ pid
    pub fn odt_for_pid(&self, pid: u8) -> DaqResult<&Odt> {
        self.lists
            .iter()
            .flat_map(|l| l.odts.iter())
            .find(|odt| odt.number == pid)
            .ok_or(DaqError::UnknownPid(pid))
    }

    /// Decode a received DAQ frame into named values
    pub fn decode(&self, dto: &DaqDto) -> DaqResult<Map<String, Value>> {
        self.odt_for_pid(dto.pid)?.decode(&dto.data)
    }
}
