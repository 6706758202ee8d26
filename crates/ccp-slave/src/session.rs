//! CCP session state
//!
//! One session per slave instance: connection state, memory transfer
//! address registers, resource locks and the DAQ configuration.

use ccp_daq::DaqTable;
use ccp_proto::{Resource, ResourceMask};

/// Connection state of the slave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connected,
}

/// Memory transfer address register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mta {
    pub address: u32,
    pub extension: u8,
}

impl Mta {
    pub fn new(address: u32, extension: u8) -> Self {
        Self { address, extension }
    }

    /// Post-increment after a transfer of `len` bytes
    pub fn advance(&mut self, len: usize) {
        self.address = self.address.wrapping_add(len as u32);
    }

    /// `[extension, address:4 LE]`
    pub fn to_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(5);
        out.push(self.extension);
        out.extend_from_slice(&self.address.to_le_bytes());
        out
    }
}

/// Pending GET_SEED challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSeed {
    pub resource: Resource,
    pub seed: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub station_address: u16,
    pub state: SessionState,
    /// Counter of the last routed CRO
    pub last_counter: Option<u8>,
    /// MTA0 (transfers) and MTA1 (MOVE destination)
    pub mta: [Mta; 2],
    /// SET_S_STATUS bits
    pub status: u8,
    /// Resources locked at session start
    pub protection: ResourceMask,
    /// Resources currently locked
    pub locked: ResourceMask,
    pub pending_seed: Option<PendingSeed>,
    pub unlock_attempts: u8,
    pub master_id: Vec<u8>,
    pub active_cal_page: Option<Mta>,
    pub daq: DaqTable,
}

impl Session {
    pub fn new(station_address: u16, protection: ResourceMask, daq: DaqTable) -> Self {
        Self {
            station_address,
            state: SessionState::Disconnected,
            last_counter: None,
            mta: [Mta::default(); 2],
            status: 0,
            protection,
            locked: protection,
            pending_seed: None,
            unlock_attempts: 0,
            master_id: Vec::new(),
            active_cal_page: None,
            daq,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn is_locked(&self, resource: Resource) -> bool {
        self.locked.contains(resource)
    }

    pub fn connect(&mut self) {
        self.state = SessionState::Connected;
    }

    /// Leave the bus but keep the session configuration
    pub fn suspend(&mut self) {
        self.state = SessionState::Disconnected;
        self.daq.stop_all();
    }

    /// End the session and reset everything to power-on state
    pub fn end(&mut self) {
        self.suspend();
        self.daq.clear();
        self.mta = [Mta::default(); 2];
        self.status = 0;
        self.locked = self.protection;
        self.pending_seed = None;
        self.unlock_attempts = 0;
        self.master_id.clear();
        self.active_cal_page = None;
    }
}
