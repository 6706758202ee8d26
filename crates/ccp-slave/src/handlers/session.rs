//! CONNECT, DISCONNECT, identification and session status

use ccp_proto::{CommandCode, Resource, ResourceMask, ReturnCode, CCP_VERSION};
use tracing::{debug, info};

use crate::engine::{le_u16, CcpSlave, HandlerResult, Outcome};
use crate::session::Mta;

impl CcpSlave {
    pub(crate) fn connect(&mut self, payload: &[u8]) -> HandlerResult {
        let station = le_u16(payload, 0);
        if station == self.session.station_address {
            if !self.session.is_connected() {
                info!(station = format!("0x{:04X}", station), "Connected");
            }
            self.session.connect();
            return Ok(Outcome::ack());
        }

        if self.session.is_connected() {
            info!(
                station = format!("0x{:04X}", station),
                "Master selected another station, temporarily disconnected"
            );
            self.scheduler.stop_all();
            self.session.suspend();
        }
        Ok(Outcome::Silent)
    }

    pub(crate) fn get_ccp_version(&mut self, payload: &[u8]) -> HandlerResult {
        debug!(
            master_version = format!("{}.{}", payload[0], payload[1]),
            "Version negotiation"
        );
        Ok(Outcome::Ack(vec![CCP_VERSION.0, CCP_VERSION.1]))
    }

    pub(crate) fn exchange_id(&mut self, payload: &[u8]) -> HandlerResult {
        self.session.master_id = payload.to_vec();

        let id = &self.config.identification;
        self.session.mta[0] = Mta::new(id.address, id.extension);

        let availability = self.resource_availability();
        debug!(
            master_id = %hex::encode(payload),
            device_id = %id.device_id,
            "Identification exchanged"
        );
        Ok(Outcome::Ack(vec![
            id.device_id.len() as u8,
            0,
            availability.bits(),
            self.session.locked.bits(),
        ]))
    }

    /// Resources whose commands this slave offers
    fn resource_availability(&self) -> ResourceMask {
        let mut mask = ResourceMask::all();
        if self.session.daq.lists().is_empty() {
            mask.remove(Resource::Daq);
        }
        let pgm_disabled = [
            CommandCode::ClearMemory,
            CommandCode::Program,
            CommandCode::Program6,
        ]
        .iter()
        .all(|c| self.config.disabled_commands.contains(c));
        if pgm_disabled {
            mask.remove(Resource::Pgm);
        }
        mask
    }

    pub(crate) fn disconnect(&mut self, payload: &[u8]) -> HandlerResult {
        if payload.len() >= 4 && le_u16(payload, 2) != self.session.station_address {
            return Ok(Outcome::Silent);
        }

        let temporary = match payload[0] {
            0 => false,
            1 => true,
            _ => return Err(ReturnCode::ParameterOutOfRange),
        };

        self.scheduler.stop_all();
        if temporary {
            self.session.suspend();
            info!("Disconnected temporarily");
        } else {
            self.session.end();
            info!("Session ended");
        }
        Ok(Outcome::ack())
    }

    pub(crate) fn test(&mut self, payload: &[u8]) -> HandlerResult {
        if le_u16(payload, 0) == self.session.station_address {
            Ok(Outcome::ack())
        } else {
            Ok(Outcome::Silent)
        }
    }

    pub(crate) fn set_s_status(&mut self, payload: &[u8]) -> HandlerResult {
        self.session.status = payload[0];
        debug!(status = format!("0x{:02X}", payload[0]), "Session status set");
        Ok(Outcome::ack())
    }

    pub(crate) fn get_s_status(&mut self) -> HandlerResult {
        Ok(Outcome::Ack(vec![self.session.status, 0]))
    }
}
