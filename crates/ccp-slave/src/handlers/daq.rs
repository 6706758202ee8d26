//! DAQ list configuration and START_STOP

use ccp_daq::{DaqError, Element};
use ccp_proto::{ReturnCode, StartStopMode};
use tracing::debug;

use crate::engine::{le_u16, le_u32, CcpSlave, HandlerResult, Outcome};

fn rejected(e: DaqError) -> ReturnCode {
    debug!(error = %e, "DAQ command rejected");
    e.return_code()
}

impl CcpSlave {
    pub(crate) fn get_daq_size(&mut self, payload: &[u8]) -> HandlerResult {
        let number = payload[0];
        let dto_id = if payload.len() >= 6 {
            Some(le_u32(payload, 2)).filter(|id| *id != 0)
        } else {
            None
        };

        self.scheduler.stop(number);
        let list = self.session.daq.clear_list(number).map_err(rejected)?;
        match dto_id {
            Some(id) => list.set_can_id(id),
            None => list.reset_can_id(),
        }

        let capacity = u16::try_from(list.capacity()).unwrap_or(u16::MAX);
        let mut reply = vec![list.odt_count() as u8, list.first_pid];
        reply.extend_from_slice(&capacity.to_le_bytes());
        Ok(Outcome::Ack(reply))
    }

    pub(crate) fn set_daq_ptr(&mut self, payload: &[u8]) -> HandlerResult {
        self.session
            .daq
            .set_pointer(payload[0], payload[1], payload[2])
            .map_err(rejected)?;
        Ok(Outcome::ack())
    }

    pub(crate) fn write_daq(&mut self, payload: &[u8]) -> HandlerResult {
        let size = payload[0];
        let extension = payload[1];
        let address = le_u32(payload, 2);

        let element = match self.config.measurement_at(address, extension) {
            Some(m) => m.element.resized(size),
            None => Element::new(address, extension, size),
        }
        .map_err(rejected)?;

        debug!(
            element = %element.name,
            size,
            pointer = ?self.session.daq.pointer(),
            "WRITE_DAQ"
        );
        self.session.daq.write(element).map_err(rejected)?;
        Ok(Outcome::ack())
    }

    pub(crate) fn start_stop(&mut self, payload: &[u8]) -> HandlerResult {
        let mode = StartStopMode::try_from(payload[0]).map_err(|_| ReturnCode::ParameterOutOfRange)?;
        let number = payload[1];
        let last_odt = payload[2];
        let first_odt = payload[3];
        let prescaler = le_u16(payload, 4);

        let list = self.session.daq.list_mut(number).map_err(rejected)?;
        match mode {
            StartStopMode::Stop => {
                self.scheduler.stop(number);
                list.stop();
            }
            StartStopMode::Start => {
                let transmission = list
                    .validate_transmission(first_odt, last_odt, prescaler)
                    .map_err(rejected)?;
                list.start(transmission);
                self.scheduler.start(list);
            }
            StartStopMode::Prepare => {
                let transmission = list
                    .validate_transmission(first_odt, last_odt, prescaler)
                    .map_err(rejected)?;
                list.arm(transmission);
                debug!(list = number, "DAQ list armed");
            }
        }
        Ok(Outcome::ack())
    }

    pub(crate) fn start_stop_all(&mut self, payload: &[u8]) -> HandlerResult {
        match StartStopMode::try_from(payload[0]) {
            Ok(StartStopMode::Stop) => {
                self.scheduler.stop_all();
                self.session.daq.stop_all();
            }
            Ok(StartStopMode::Start) => {
                for list in self.session.daq.lists_mut() {
                    if list.has_elements() {
                        let transmission = list.resume_transmission();
                        list.start(transmission);
                        self.scheduler.start(list);
                    }
                }
            }
            _ => return Err(ReturnCode::ParameterOutOfRange),
        }
        Ok(Outcome::ack())
    }
}
