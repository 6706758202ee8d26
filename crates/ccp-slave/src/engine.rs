//! CCP slave engine
//!
//! Decodes CROs addressed to this slave, routes them to the command
//! handlers and encodes the resulting CRM. Command handling is sequential;
//! DAQ transmission runs on the [`Timebase`].

use std::collections::HashSet;
use std::sync::Arc;

use ccp_daq::{DaqList, DaqTable};
use ccp_proto::{CanMessage, CommandCode, Crm, Cro, ResourceMask, ReturnCode};
use tracing::{debug, error, trace, warn};

use crate::config::SlaveConfig;
use crate::error::SlaveResult;
use crate::memory::Memory;
use crate::scheduler::DaqScheduler;
use crate::security::{SeedKey, XorSeedKey};
use crate::session::Session;
use crate::timebase::Timebase;
use crate::transport::{CanTransport, TransportError};

/// Successful handler result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Acknowledge with payload
    Ack(Vec<u8>),
    /// Not addressed to this slave, no CRM
    Silent,
}

impl Outcome {
    pub fn ack() -> Self {
        Outcome::Ack(Vec::new())
    }
}

/// Handler result, `Err` carries the negative return code
pub type HandlerResult = Result<Outcome, ReturnCode>;

/// CCP slave protocol engine
pub struct CcpSlave {
    pub(crate) config: SlaveConfig,
    pub(crate) session: Session,
    pub(crate) memory: Arc<dyn Memory>,
    pub(crate) transport: Arc<dyn CanTransport>,
    pub(crate) seed_key: Box<dyn SeedKey>,
    pub(crate) scheduler: DaqScheduler,
    disabled: HashSet<CommandCode>,
}

impl CcpSlave {
    pub fn new(
        config: SlaveConfig,
        memory: Arc<dyn Memory>,
        transport: Arc<dyn CanTransport>,
        timebase: Arc<dyn Timebase>,
    ) -> SlaveResult<Self> {
        config.validate()?;

        let lists = config
            .daq
            .lists
            .iter()
            .enumerate()
            .map(|(number, list)| {
                DaqList::new(
                    number as u8,
                    list.first_pid,
                    list.odt_count,
                    list.can_id.unwrap_or(config.dto_id),
                )
            })
            .collect();
        let protection = ResourceMask::from_resources(config.security.protected.iter().copied());
        let session = Session::new(
            config.station_address,
            protection,
            DaqTable::new(lists),
        );
        let seed_key = Box::new(XorSeedKey::new(config.security.secret_bytes()?));
        let scheduler = DaqScheduler::new(timebase, memory.clone(), transport.clone(), config.dto_id);
        let disabled = config.disabled_commands.iter().copied().collect();

        Ok(Self {
            config,
            session,
            memory,
            transport,
            seed_key,
            scheduler,
            disabled,
        })
    }

    /// Replace the seed & key algorithm
    pub fn with_seed_key(mut self, seed_key: Box<dyn SeedKey>) -> Self {
        self.seed_key = seed_key;
        self
    }

    pub fn config(&self) -> &SlaveConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether a DAQ list currently has a transmission task
    pub fn is_transmitting(&self, list: u8) -> bool {
        self.scheduler.is_running(list)
    }

    /// Handle one inbound frame, returning the CRM to send, if any
    pub fn receive(&mut self, frame: &CanMessage) -> Option<CanMessage> {
        if frame.id != self.config.cro_id {
            trace!(id = frame.id, "Ignoring frame on foreign id");
            return None;
        }

        let cro = match Cro::decode(&frame.data) {
            Ok(cro) => cro,
            Err(e) => {
                warn!(error = %e, data = ?frame.data, "Dropping malformed CRO");
                return None;
            }
        };
        debug!(cro = %cro.describe(), "CRO received");

        let code = cro.command_code();
        if !self.session.is_connected() {
            match code {
                Ok(code) if code.answered_while_disconnected() => {}
                _ => {
                    trace!(command = cro.command, "Ignoring CRO while disconnected");
                    return None;
                }
            }
        }
        self.session.last_counter = Some(cro.counter);

        let result = match code {
            Ok(code) => self.dispatch(code, &cro.payload),
            Err(raw) => {
                warn!(command = format!("0x{:02X}", raw), "Unknown command");
                Err(ReturnCode::UnknownCommand)
            }
        };

        let (return_code, payload) = match result {
            Ok(Outcome::Ack(payload)) => (ReturnCode::Acknowledge, payload),
            Ok(Outcome::Silent) => {
                debug!(counter = cro.counter, "No CRM");
                return None;
            }
            Err(rc) => (rc, Vec::new()),
        };

        let crm = match Crm::new(return_code, cro.counter, payload) {
            Ok(crm) => crm,
            Err(e) => {
                error!(error = %e, "Handler produced an invalid CRM");
                return None;
            }
        };
        debug!(
            counter = crm.counter,
            return_code = %crm.return_code,
            payload = ?crm.payload,
            "CRM"
        );
        Some(CanMessage::new(self.config.dto_id, crm.encode()))
    }

    /// Handle one inbound frame and transmit the CRM
    pub fn process(&mut self, frame: &CanMessage) -> Result<(), TransportError> {
        match self.receive(frame) {
            Some(crm) => self.transport.send(&crm),
            None => Ok(()),
        }
    }

    /// Process the next pending frame, returns whether one was pending
    pub fn poll(&mut self) -> Result<bool, TransportError> {
        match self.transport.try_recv()? {
            Some(frame) => {
                self.process(&frame)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn dispatch(&mut self, code: CommandCode, payload: &[u8]) -> HandlerResult {
        if !code.is_mandatory() && self.disabled.contains(&code) {
            return Err(ReturnCode::ResourceFunctionNotAvailable);
        }
        if let Some(resource) = code.protected_by() {
            if self.session.is_locked(resource) {
                debug!(command = %code, ?resource, "Resource locked");
                return Err(ReturnCode::AccessLocked);
            }
        }
        if payload.len() < code.min_payload_len() {
            return Err(ReturnCode::CommandSyntax);
        }

        match code {
            CommandCode::Connect => self.connect(payload),
            CommandCode::GetCcpVersion => self.get_ccp_version(payload),
            CommandCode::ExchangeId => self.exchange_id(payload),
            CommandCode::SetMta => self.set_mta(payload),
            CommandCode::Dnload => self.dnload(payload),
            CommandCode::Upload => self.upload(payload),
            CommandCode::GetDaqSize => self.get_daq_size(payload),
            CommandCode::SetDaqPtr => self.set_daq_ptr(payload),
            CommandCode::WriteDaq => self.write_daq(payload),
            CommandCode::StartStop => self.start_stop(payload),
            CommandCode::Disconnect => self.disconnect(payload),
            CommandCode::GetSeed => self.get_seed(payload),
            CommandCode::Unlock => self.unlock(payload),
            CommandCode::Dnload6 => self.dnload_6(payload),
            CommandCode::ShortUp => self.short_up(payload),
            CommandCode::SelectCalPage => self.select_cal_page(),
            CommandCode::SetSStatus => self.set_s_status(payload),
            CommandCode::GetSStatus => self.get_s_status(),
            CommandCode::BuildChksum => self.build_chksum(payload),
            CommandCode::ClearMemory => self.clear_memory(payload),
            CommandCode::Program => self.dnload(payload),
            CommandCode::Program6 => self.dnload_6(payload),
            CommandCode::Move => self.move_block(payload),
            CommandCode::Test => self.test(payload),
            CommandCode::GetActiveCalPage => self.get_active_cal_page(),
            CommandCode::StartStopAll => self.start_stop_all(payload),
            CommandCode::DiagService | CommandCode::ActionService => {
                Err(ReturnCode::ResourceFunctionNotAvailable)
            }
        }
    }
}

/// Little-endian u16 at `offset`
pub(crate) fn le_u16(payload: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([payload[offset], payload[offset + 1]])
}

/// Little-endian u32 at `offset`
pub(crate) fn le_u32(payload: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        payload[offset],
        payload[offset + 1],
        payload[offset + 2],
        payload[offset + 3],
    ])
}
