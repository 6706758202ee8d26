//! DAQ transmission scheduling
//!
//! Each running DAQ list owns one periodic task. The task holds a snapshot
//! of the list's ODTs taken at start; WRITE_DAQ into a running list is
//! rejected, so the snapshot stays current until the list stops.

use std::collections::HashMap;
use std::sync::Arc;

use ccp_daq::{DaqList, Odt};
use ccp_proto::{CanMessage, DaqDto, EventMessage, ReturnCode};
use tracing::{debug, error, info, warn};

use crate::memory::Memory;
use crate::timebase::{CancelHandle, Timebase};
use crate::transport::{CanTransport, TransportError};

pub struct DaqScheduler {
    timebase: Arc<dyn Timebase>,
    memory: Arc<dyn Memory>,
    transport: Arc<dyn CanTransport>,
    /// Event message id
    dto_id: u32,
    tasks: HashMap<u8, CancelHandle>,
}

impl DaqScheduler {
    pub fn new(
        timebase: Arc<dyn Timebase>,
        memory: Arc<dyn Memory>,
        transport: Arc<dyn CanTransport>,
        dto_id: u32,
    ) -> Self {
        Self {
            timebase,
            memory,
            transport,
            dto_id,
            tasks: HashMap::new(),
        }
    }

    /// (Re)start transmission of `list` with its current parameters
    pub fn start(&mut self, list: &DaqList) {
        self.stop(list.number);

        let transmission = list.resume_transmission();
        let period = self.timebase.base_cycle() * u32::from(transmission.prescaler);
        let odts = list.snapshot();
        let number = list.number;

        info!(
            list = number,
            first_odt = transmission.first_odt,
            last_odt = transmission.last_odt,
            period_ms = period.as_millis() as u64,
            "DAQ list started"
        );

        let memory = self.memory.clone();
        let transport = self.transport.clone();
        let dto_id = self.dto_id;
        let handle = self.timebase.schedule_every(
            period,
            Box::new(move || {
                transmit(number, &odts, memory.as_ref(), transport.as_ref(), dto_id);
            }),
        );
        self.tasks.insert(number, handle);
    }

    pub fn stop(&mut self, number: u8) {
        if let Some(mut handle) = self.tasks.remove(&number) {
            handle.cancel();
            info!(list = number, "DAQ list stopped");
        }
    }

    pub fn stop_all(&mut self) {
        for (number, mut handle) in self.tasks.drain() {
            handle.cancel();
            debug!(list = number, "DAQ list stopped");
        }
    }

    pub fn is_running(&self, number: u8) -> bool {
        self.tasks.contains_key(&number)
    }
}

/// Sample and send every ODT of one period, in order
fn transmit(
    list: u8,
    odts: &[Odt],
    memory: &dyn Memory,
    transport: &dyn CanTransport,
    dto_id: u32,
) {
    for odt in odts {
        let payload = match odt.sample(|e| memory.read(e.address, e.extension, e.len())) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(list, pid = odt.number, error = %e, "DAQ sample failed");
                continue;
            }
        };
        let dto = match DaqDto::new(odt.number, payload) {
            Ok(dto) => dto,
            Err(e) => {
                warn!(list, pid = odt.number, error = %e, "Invalid DAQ frame");
                continue;
            }
        };

        match transport.send(&CanMessage::new(odt.can_id, dto.encode())) {
            Ok(()) => {}
            Err(TransportError::Busy) => {
                warn!(list, pid = odt.number, "DAQ processor overload");
                let event = EventMessage::new(ReturnCode::DaqProcessorOverload);
                if let Err(e) = transport.send(&CanMessage::new(dto_id, event.encode())) {
                    debug!(error = %e, "Overload event not sent");
                }
                return;
            }
            Err(e) => {
                error!(list, pid = odt.number, error = %e, "DAQ send failed");
                return;
            }
        }
    }
}
