//! Engine tests driving a slave through CAN frames
//!
//! Every test talks to the slave the way a master on the bus would:
//! encoded CROs in, decoded CRMs out. DAQ emission is observed on the mock
//! transport while a manual timebase advances virtual time.

use std::sync::Arc;
use std::time::Duration;

use ccp_proto::{CanMessage, CommandCode, Crm, Cro, DaqDto, Dto, Resource, ReturnCode};
use ccp_slave::{
    CcpSlave, ManualTimebase, Memory, MockTransport, SeedKey, SimulatedMemory, SlaveConfig,
    TokioTimebase, XorSeedKey,
};
use crc::{Crc, CRC_32_ISO_HDLC};
use pretty_assertions::assert_eq;
use rstest::rstest;

const CRO_ID: u32 = 0x7E1;
const DTO_ID: u32 = 0x321;
const STATION: u16 = 0x0039;

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    slave: CcpSlave,
    transport: Arc<MockTransport>,
    timebase: Arc<ManualTimebase>,
    memory: Arc<SimulatedMemory>,
    counter: u8,
}

fn harness() -> Harness {
    harness_with(SlaveConfig::default())
}

fn harness_with(config: SlaveConfig) -> Harness {
    let memory = Arc::new(SimulatedMemory::from_config(&config).unwrap());
    let transport = Arc::new(MockTransport::new());
    let timebase = Arc::new(ManualTimebase::new(config.base_cycle()));
    let slave = CcpSlave::new(config, memory.clone(), transport.clone(), timebase.clone()).unwrap();
    Harness {
        slave,
        transport,
        timebase,
        memory,
        counter: 0,
    }
}

impl Harness {
    /// Send a CRO and decode the CRM, if any
    fn send(&mut self, command: CommandCode, payload: &[u8]) -> Option<Crm> {
        self.counter = self.counter.wrapping_add(1);
        let cro = Cro::new(command, self.counter, payload.to_vec()).unwrap();
        let reply = self.slave.receive(&CanMessage::new(CRO_ID, cro.encode()))?;
        assert_eq!(reply.id, DTO_ID);
        let crm = Crm::decode(&reply.data).unwrap();
        assert_eq!(crm.counter, self.counter);
        Some(crm)
    }

    fn ack(&mut self, command: CommandCode, payload: &[u8]) -> Vec<u8> {
        let crm = self
            .send(command, payload)
            .unwrap_or_else(|| panic!("{} produced no CRM", command));
        assert_eq!(crm.return_code, ReturnCode::Acknowledge, "{}", command);
        crm.payload
    }

    fn reject(&mut self, command: CommandCode, payload: &[u8]) -> ReturnCode {
        let crm = self
            .send(command, payload)
            .unwrap_or_else(|| panic!("{} produced no CRM", command));
        assert!(crm.payload.is_empty());
        crm.return_code
    }

    fn connect(&mut self) {
        self.ack(CommandCode::Connect, &STATION.to_le_bytes());
    }

    fn set_mta(&mut self, address: u32, number: u8) {
        let mut payload = address.to_le_bytes().to_vec();
        payload.extend_from_slice(&[0, number]);
        self.ack(CommandCode::SetMta, &payload);
    }

    fn write_daq(&mut self, size: u8, address: u32) -> Option<Crm> {
        let mut payload = vec![size, 0];
        payload.extend_from_slice(&address.to_le_bytes());
        self.send(CommandCode::WriteDaq, &payload)
    }

    /// List 0: ODT 0 carries 4 bytes at 0x1000, ODT 1 carries 2 bytes at 0x1010
    fn configure_list_0(&mut self) {
        self.ack(CommandCode::SetDaqPtr, &[0, 0, 0]);
        assert_eq!(self.write_daq(4, 0x1000).unwrap().return_code, ReturnCode::Acknowledge);
        self.ack(CommandCode::SetDaqPtr, &[0, 1, 0]);
        assert_eq!(self.write_daq(2, 0x1010).unwrap().return_code, ReturnCode::Acknowledge);
    }

    fn start_list(&mut self, list: u8, first: u8, last: u8, prescaler: u16) {
        let mut payload = vec![1, list, last, first];
        payload.extend_from_slice(&prescaler.to_le_bytes());
        self.ack(CommandCode::StartStop, &payload);
    }

    /// DAQ frames sent since the last call
    fn daq_frames(&self) -> Vec<(u32, DaqDto)> {
        self.transport
            .take_sent()
            .into_iter()
            .filter_map(|frame| match Dto::decode(&frame.data) {
                Ok(Dto::Daq(dto)) => Some((frame.id, dto)),
                _ => None,
            })
            .collect()
    }
}

// =============================================================================
// Connection
// =============================================================================

#[test]
fn test_connect_scenario_frame() {
    let mut h = harness_with(SlaveConfig {
        station_address: 0x0815,
        ..SlaveConfig::default()
    });

    let reply = h
        .slave
        .receive(&CanMessage::new(CRO_ID, vec![0x01, 0x05, 0x15, 0x08]))
        .unwrap();

    assert_eq!(reply.data, vec![0xFF, 0x00, 0x05]);
    assert!(h.slave.session().is_connected());
}

#[test]
fn test_connect_foreign_station_is_silent() {
    let mut h = harness();

    assert!(h.send(CommandCode::Connect, &[0x15, 0x08]).is_none());
    assert!(!h.slave.session().is_connected());
}

#[test]
fn test_commands_while_disconnected_are_silent() {
    let mut h = harness();

    assert!(h.send(CommandCode::SetMta, &[0, 0x10, 0, 0, 0]).is_none());
    assert!(h.send(CommandCode::Upload, &[1]).is_none());
    assert!(h.send(CommandCode::Test, &STATION.to_le_bytes()).is_none());
    assert!(h.send(CommandCode::Disconnect, &[0]).is_none());
    assert_eq!(h.slave.session().last_counter, None);
}

#[test]
fn test_every_gated_command_is_silent_while_disconnected() {
    let mut h = harness();

    for command in CommandCode::ALL {
        if matches!(command, CommandCode::Connect | CommandCode::GetCcpVersion) {
            continue;
        }
        let payload = vec![0; command.min_payload_len()];
        assert!(h.send(command, &payload).is_none(), "{} answered", command);
    }
    assert!(h.slave.receive(&CanMessage::new(CRO_ID, vec![0x42, 0x01])).is_none());
    assert!(h.transport.take_sent().is_empty());
    assert!(!h.slave.session().is_connected());
}

#[test]
fn test_get_ccp_version_while_disconnected() {
    let mut h = harness();

    assert_eq!(h.ack(CommandCode::GetCcpVersion, &[2, 1]), vec![2, 1]);
    assert!(!h.slave.session().is_connected());
}

#[rstest]
#[case(0x00)]
#[case(0x7F)]
#[case(0xFF)]
fn test_counter_is_echoed(#[case] counter: u8) {
    let mut h = harness();
    h.connect();

    let ok = Cro::new(CommandCode::GetSStatus, counter, vec![]).unwrap();
    let reply = h.slave.receive(&CanMessage::new(CRO_ID, ok.encode())).unwrap();
    assert_eq!(reply.data[2], counter);

    let rejected = Cro::new(CommandCode::Upload, counter, vec![6]).unwrap();
    let reply = h.slave.receive(&CanMessage::new(CRO_ID, rejected.encode())).unwrap();
    assert_eq!(reply.data, vec![0xFF, 0x32, counter]);
}

#[test]
fn test_connect_other_station_suspends_session() {
    let mut h = harness();
    h.connect();
    h.configure_list_0();
    h.start_list(0, 0, 1, 1);

    assert!(h.send(CommandCode::Connect, &[0x40, 0x00]).is_none());
    assert!(!h.slave.session().is_connected());
    assert!(!h.slave.is_transmitting(0));
    assert!(h.send(CommandCode::GetSStatus, &[]).is_none());

    h.connect();
    assert!(h.slave.session().daq.list(0).unwrap().has_elements());
}

#[test]
fn test_test_command_checks_station() {
    let mut h = harness();
    h.connect();

    assert_eq!(h.ack(CommandCode::Test, &STATION.to_le_bytes()), Vec::<u8>::new());
    assert!(h.send(CommandCode::Test, &[0x40, 0x00]).is_none());
}

// =============================================================================
// Disconnect
// =============================================================================

#[test]
fn test_temporary_disconnect_preserves_daq_configuration() {
    let mut h = harness();
    h.connect();
    h.configure_list_0();
    h.set_mta(0x1100, 0);

    h.ack(CommandCode::Disconnect, &[1, 0, 0x39, 0x00]);
    assert!(!h.slave.session().is_connected());

    h.connect();
    let list = h.slave.session().daq.list(0).unwrap();
    assert_eq!(list.odt(0).unwrap().elements().len(), 1);
    assert_eq!(list.odt(1).unwrap().elements().len(), 1);
    assert_eq!(h.slave.session().mta[0].address, 0x1100);
}

#[test]
fn test_permanent_disconnect_clears_daq_configuration() {
    let mut h = harness();
    h.connect();
    h.configure_list_0();

    h.ack(CommandCode::Disconnect, &[0, 0, 0x39, 0x00]);
    h.connect();

    let daq = &h.slave.session().daq;
    assert!(daq.lists().iter().all(|list| !list.has_elements()));
    assert_eq!(daq.pointer(), None);
}

#[test]
fn test_permanent_disconnect_restores_daq_frame_id() {
    let mut h = harness();
    h.connect();
    h.ack(CommandCode::GetDaqSize, &[0, 0, 0x00, 0x04, 0x00, 0x00]);

    h.ack(CommandCode::Disconnect, &[0, 0, 0x39, 0x00]);
    h.connect();
    h.ack(CommandCode::GetDaqSize, &[0, 0, 0, 0, 0, 0]);
    h.ack(CommandCode::SetDaqPtr, &[0, 0, 0]);
    h.write_daq(1, 0x1005);
    h.start_list(0, 0, 0, 1);

    h.timebase.advance_cycles(1);

    assert_eq!(h.daq_frames(), vec![(DTO_ID, DaqDto::new(0, vec![0x05]).unwrap())]);
}

#[test]
fn test_disconnect_other_station_is_silent() {
    let mut h = harness();
    h.connect();

    assert!(h.send(CommandCode::Disconnect, &[0, 0, 0x40, 0x00]).is_none());
    assert!(h.slave.session().is_connected());
}

#[test]
fn test_disconnect_rejects_unknown_mode() {
    let mut h = harness();
    h.connect();

    assert_eq!(
        h.reject(CommandCode::Disconnect, &[2]),
        ReturnCode::ParameterOutOfRange
    );
    assert!(h.slave.session().is_connected());
}

// =============================================================================
// Routing and validation
// =============================================================================

#[test]
fn test_unknown_command_code() {
    let mut h = harness();
    h.connect();

    let reply = h.slave.receive(&CanMessage::new(CRO_ID, vec![0x42, 0x07])).unwrap();
    assert_eq!(reply.data, vec![0xFF, 0x30, 0x07]);
}

#[test]
fn test_foreign_id_and_malformed_frames_are_ignored() {
    let mut h = harness();

    assert!(h.slave.receive(&CanMessage::new(0x123, vec![0x01, 0x01, 0x39, 0x00])).is_none());
    assert!(h.slave.receive(&CanMessage::new(CRO_ID, vec![0x01])).is_none());
    assert!(h.slave.receive(&CanMessage::new(CRO_ID, vec![0; 9])).is_none());
    assert!(!h.slave.session().is_connected());
}

#[test]
fn test_short_payload_is_command_syntax() {
    let mut h = harness();
    h.connect();

    assert_eq!(h.reject(CommandCode::SetMta, &[0, 0x10, 0]), ReturnCode::CommandSyntax);
    assert_eq!(h.reject(CommandCode::WriteDaq, &[2, 0, 0]), ReturnCode::CommandSyntax);
    assert_eq!(h.reject(CommandCode::Dnload, &[3, 0xAA]), ReturnCode::CommandSyntax);
    assert_eq!(h.slave.session().mta[0].address, 0);
}

#[test]
fn test_disabled_optional_command() {
    let mut h = harness_with(SlaveConfig {
        disabled_commands: vec![CommandCode::Move, CommandCode::ShortUp],
        ..SlaveConfig::default()
    });
    h.connect();

    assert_eq!(
        h.reject(CommandCode::Move, &[4, 0, 0, 0]),
        ReturnCode::ResourceFunctionNotAvailable
    );
    assert_eq!(
        h.reject(CommandCode::ShortUp, &[1, 0, 0, 0x10, 0, 0]),
        ReturnCode::ResourceFunctionNotAvailable
    );
}

#[test]
fn test_mandatory_command_cannot_be_disabled() {
    let config = SlaveConfig {
        disabled_commands: vec![CommandCode::Dnload],
        ..SlaveConfig::default()
    };
    let memory = Arc::new(SimulatedMemory::from_config(&config).unwrap());
    let timebase = Arc::new(ManualTimebase::new(config.base_cycle()));

    let result = CcpSlave::new(config, memory, Arc::new(MockTransport::new()), timebase);
    assert!(result.is_err());
}

#[test]
fn test_service_commands_not_available() {
    let mut h = harness();
    h.connect();

    assert_eq!(
        h.reject(CommandCode::DiagService, &[0x01, 0x00]),
        ReturnCode::ResourceFunctionNotAvailable
    );
    assert_eq!(
        h.reject(CommandCode::ActionService, &[]),
        ReturnCode::ResourceFunctionNotAvailable
    );
}

#[test]
fn test_poll_answers_through_transport() {
    let mut h = harness();
    h.transport
        .inject_incoming(CanMessage::new(CRO_ID, vec![0x01, 0x09, 0x39, 0x00]));

    assert!(h.slave.poll().unwrap());
    assert!(!h.slave.poll().unwrap());

    let sent = h.transport.take_sent();
    assert_eq!(sent, vec![CanMessage::new(DTO_ID, vec![0xFF, 0x00, 0x09])]);
}

#[test]
fn test_poll_reports_closed_transport() {
    let mut h = harness();
    h.transport.set_connected(false);

    assert!(h.slave.poll().is_err());
}

// =============================================================================
// Identification and status
// =============================================================================

#[test]
fn test_exchange_id_points_mta_at_device_id() {
    let mut h = harness();
    h.connect();

    let reply = h.ack(CommandCode::ExchangeId, &[1, 2, 3, 4, 5, 6]);
    // 7 bytes, availability CAL|DAQ|PGM, PGM locked
    assert_eq!(reply, vec![7, 0, 0x43, 0x40]);
    assert_eq!(h.slave.session().master_id, vec![1, 2, 3, 4, 5, 6]);

    assert_eq!(h.ack(CommandCode::Upload, &[5]), b"CCP_S".to_vec());
    assert_eq!(h.ack(CommandCode::Upload, &[2]), b"IM".to_vec());
}

#[test]
fn test_session_status() {
    let mut h = harness();
    h.connect();

    h.ack(CommandCode::SetSStatus, &[0x81]);
    assert_eq!(h.ack(CommandCode::GetSStatus, &[]), vec![0x81, 0]);
}

// =============================================================================
// Memory transfer
// =============================================================================

#[rstest]
fn test_dnload_upload_round_trip(#[values(0, 1, 2, 3, 4, 5)] n: u8) {
    let mut h = harness();
    h.connect();
    let address = 0x1100u32;
    let data: Vec<u8> = (0..n).map(|i| 0xA0 + i).collect();

    h.set_mta(address, 0);
    let mut payload = vec![n];
    payload.extend_from_slice(&data);
    let reply = h.ack(CommandCode::Dnload, &payload);

    let mut mta = vec![0];
    mta.extend_from_slice(&(address + u32::from(n)).to_le_bytes());
    assert_eq!(reply, mta);

    h.ack(CommandCode::Upload, &[n]);
    assert_eq!(h.slave.session().mta[0].address, address + 2 * u32::from(n));

    h.set_mta(address, 0);
    assert_eq!(h.ack(CommandCode::Upload, &[n]), data);
}

#[test]
fn test_dnload_6_writes_six_bytes() {
    let mut h = harness();
    h.connect();
    h.set_mta(0x1200, 0);

    let reply = h.ack(CommandCode::Dnload6, &[1, 2, 3, 4, 5, 6]);
    assert_eq!(reply, vec![0, 0x06, 0x12, 0x00, 0x00]);
    assert_eq!(h.memory.read(0x1200, 0, 6).unwrap(), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_failed_dnload_leaves_mta() {
    let mut h = harness();
    h.connect();
    h.set_mta(0xF000, 0);

    assert_eq!(
        h.reject(CommandCode::Dnload, &[2, 0xAA, 0xBB]),
        ReturnCode::AccessDenied
    );
    assert_eq!(h.slave.session().mta[0].address, 0xF000);

    h.set_mta(0x1FFE, 0);
    assert_eq!(
        h.reject(CommandCode::Dnload, &[4, 1, 2, 3, 4]),
        ReturnCode::ParameterOutOfRange
    );
    assert_eq!(h.slave.session().mta[0].address, 0x1FFE);
}

#[test]
fn test_upload_limits() {
    let mut h = harness();
    h.connect();
    h.set_mta(0x1000, 0);

    assert_eq!(h.reject(CommandCode::Upload, &[6]), ReturnCode::ParameterOutOfRange);

    h.set_mta(0x1FFE, 0);
    assert_eq!(h.reject(CommandCode::Upload, &[4]), ReturnCode::ParameterOutOfRange);
    assert_eq!(h.slave.session().mta[0].address, 0x1FFE);
}

#[test]
fn test_set_mta_rejects_unknown_register() {
    let mut h = harness();
    h.connect();

    assert_eq!(
        h.reject(CommandCode::SetMta, &[0, 0x10, 0, 0, 0, 2]),
        ReturnCode::ParameterOutOfRange
    );
}

#[test]
fn test_short_up_leaves_mta() {
    let mut h = harness();
    h.connect();
    h.set_mta(0x1000, 0);

    assert_eq!(
        h.ack(CommandCode::ShortUp, &[2, 0, 0x20, 0x10, 0x00, 0x00]),
        vec![0x20, 0x21]
    );
    assert_eq!(h.slave.session().mta[0].address, 0x1000);
}

#[test]
fn test_build_chksum() {
    let mut h = harness();
    h.connect();
    h.set_mta(0x1000, 0);

    let reply = h.ack(CommandCode::BuildChksum, &[16, 0, 0, 0]);

    let expected = Crc::<u32>::new(&CRC_32_ISO_HDLC).checksum(&(0u8..16).collect::<Vec<_>>());
    let mut payload = vec![4];
    payload.extend_from_slice(&expected.to_le_bytes());
    assert_eq!(reply, payload);
    assert_eq!(h.slave.session().mta[0].address, 0x1000);
}

#[test]
fn test_move_copies_between_mtas() {
    let mut h = harness();
    h.connect();
    h.set_mta(0x1000, 0);
    h.set_mta(0x1800, 1);

    h.ack(CommandCode::Move, &[4, 0, 0, 0]);

    assert_eq!(h.memory.read(0x1800, 0, 4).unwrap(), vec![0, 1, 2, 3]);
}

#[test]
fn test_calibration_page() {
    let mut h = harness();
    h.connect();

    assert_eq!(h.ack(CommandCode::GetActiveCalPage, &[]), vec![0, 0, 0, 0, 0]);

    h.set_mta(0x1200, 0);
    h.ack(CommandCode::SelectCalPage, &[]);
    assert_eq!(
        h.ack(CommandCode::GetActiveCalPage, &[]),
        vec![0, 0x00, 0x12, 0x00, 0x00]
    );
}

// =============================================================================
// Seed & key
// =============================================================================

fn unlock_key(seed: &[u8]) -> Vec<u8> {
    XorSeedKey::new(vec![0xFF]).key_for(seed)
}

#[test]
fn test_locked_resource_until_unlocked() {
    let mut h = harness();
    h.connect();
    h.set_mta(0x1000, 0);

    assert_eq!(h.reject(CommandCode::ClearMemory, &[4, 0, 0, 0]), ReturnCode::AccessLocked);
    assert_eq!(h.reject(CommandCode::Program, &[1, 0xAA]), ReturnCode::AccessLocked);
    assert_eq!(h.memory.read(0x1000, 0, 4).unwrap(), vec![0, 1, 2, 3]);

    let reply = h.ack(CommandCode::GetSeed, &[0x40]);
    assert_eq!(reply[0], 1);
    let privileges = h.ack(CommandCode::Unlock, &unlock_key(&reply[1..]));
    assert_eq!(privileges, vec![0x43]);

    h.ack(CommandCode::ClearMemory, &[4, 0, 0, 0]);
    assert_eq!(h.memory.read(0x1000, 0, 4).unwrap(), vec![0xFF; 4]);
    h.ack(CommandCode::Program, &[1, 0xAA]);
    assert_eq!(h.memory.read(0x1000, 0, 1).unwrap(), vec![0xAA]);
}

#[test]
fn test_get_seed_for_unlocked_resource() {
    let mut h = harness();
    h.connect();

    assert_eq!(h.ack(CommandCode::GetSeed, &[0x01]), vec![0, 0, 0, 0, 0]);
    assert_eq!(
        h.reject(CommandCode::GetSeed, &[0x03]),
        ReturnCode::ParameterOutOfRange
    );
}

/// Fixed seed; the key is the seed reversed
struct FixedSeed(Vec<u8>);

impl SeedKey for FixedSeed {
    fn seed(&self, _resource: Resource) -> Vec<u8> {
        self.0.clone()
    }

    fn verify(&self, _resource: Resource, seed: &[u8], key: &[u8]) -> bool {
        key.iter().rev().eq(seed.iter())
    }
}

fn harness_with_seed(seed: &[u8]) -> Harness {
    let mut h = harness();
    h.slave = h.slave.with_seed_key(Box::new(FixedSeed(seed.to_vec())));
    h
}

#[test]
fn test_custom_seed_key() {
    let mut h = harness_with_seed(&[0xAB, 0xCD]);
    h.connect();

    assert_eq!(h.ack(CommandCode::GetSeed, &[0x40]), vec![1, 0xAB, 0xCD]);
    assert_eq!(h.ack(CommandCode::Unlock, &[0xCD, 0xAB]), vec![0x43]);
    assert!(!h.slave.session().is_locked(Resource::Pgm));
}

#[test]
fn test_seed_longer_than_crm_is_refused() {
    let mut h = harness_with_seed(&[1, 2, 3, 4, 5, 6]);
    h.connect();

    assert_eq!(
        h.reject(CommandCode::GetSeed, &[0x40]),
        ReturnCode::ResourceFunctionNotAvailable
    );
    assert_eq!(h.reject(CommandCode::Unlock, &[4, 3, 2, 1]), ReturnCode::AccessLocked);
    assert_eq!(h.slave.session().unlock_attempts, 0);
    assert!(h.slave.session().is_locked(Resource::Pgm));
}

#[test]
fn test_unlock_without_seed() {
    let mut h = harness();
    h.connect();

    assert_eq!(h.reject(CommandCode::Unlock, &[0, 0, 0, 0]), ReturnCode::AccessLocked);
}

#[test]
fn test_unlock_retry_limit() {
    let mut h = harness();
    h.connect();

    let reply = h.ack(CommandCode::GetSeed, &[0x40]);
    let key = unlock_key(&reply[1..]);
    let mut wrong = key.clone();
    wrong[0] ^= 0x01;

    for _ in 0..3 {
        assert_eq!(h.reject(CommandCode::Unlock, &wrong), ReturnCode::AccessLocked);
    }
    assert_eq!(h.reject(CommandCode::Unlock, &wrong), ReturnCode::AccessDenied);
    assert_eq!(h.reject(CommandCode::Unlock, &key), ReturnCode::AccessDenied);
    assert!(h.slave.session().is_locked(Resource::Pgm));

    h.ack(CommandCode::Disconnect, &[0]);
    h.connect();
    let reply = h.ack(CommandCode::GetSeed, &[0x40]);
    h.ack(CommandCode::Unlock, &unlock_key(&reply[1..]));
}

#[test]
fn test_permanent_disconnect_relocks() {
    let mut h = harness();
    h.connect();
    let reply = h.ack(CommandCode::GetSeed, &[0x40]);
    h.ack(CommandCode::Unlock, &unlock_key(&reply[1..]));

    h.ack(CommandCode::Disconnect, &[0]);
    h.connect();

    assert_eq!(h.reject(CommandCode::ClearMemory, &[1, 0, 0, 0]), ReturnCode::AccessLocked);
}

// =============================================================================
// DAQ configuration
// =============================================================================

#[test]
fn test_get_daq_size() {
    let mut h = harness();
    h.connect();

    assert_eq!(h.ack(CommandCode::GetDaqSize, &[0, 0]), vec![4, 0, 28, 0]);
    assert_eq!(h.ack(CommandCode::GetDaqSize, &[1, 0]), vec![4, 4, 28, 0]);
    assert_eq!(
        h.reject(CommandCode::GetDaqSize, &[5, 0]),
        ReturnCode::ParameterOutOfRange
    );
}

#[test]
fn test_get_daq_size_clears_list() {
    let mut h = harness();
    h.connect();
    h.configure_list_0();

    h.ack(CommandCode::GetDaqSize, &[0, 0]);

    assert!(!h.slave.session().daq.list(0).unwrap().has_elements());
}

#[test]
fn test_get_daq_size_drops_pointer_into_list() {
    let mut h = harness();
    h.connect();
    h.ack(CommandCode::SetDaqPtr, &[0, 0, 0]);
    h.write_daq(4, 0x1000);

    h.ack(CommandCode::GetDaqSize, &[1, 0]);
    assert_eq!(h.slave.session().daq.pointer().map(|p| p.element), Some(1));

    h.ack(CommandCode::GetDaqSize, &[0, 0]);
    assert_eq!(h.slave.session().daq.pointer(), None);
    assert_eq!(
        h.write_daq(2, 0x1010).unwrap().return_code,
        ReturnCode::ParameterOutOfRange
    );
}

#[test]
fn test_set_daq_ptr_rejects_bad_indices() {
    let mut h = harness();
    h.connect();
    h.ack(CommandCode::SetDaqPtr, &[0, 1, 2]);

    for payload in [[2, 0, 0], [0, 4, 0], [0, 0, 7]] {
        assert_eq!(
            h.reject(CommandCode::SetDaqPtr, &payload),
            ReturnCode::ParameterOutOfRange
        );
    }
    let pointer = h.slave.session().daq.pointer().unwrap();
    assert_eq!((pointer.list, pointer.odt, pointer.element), (0, 1, 2));
}

#[test]
fn test_write_daq_overflow_leaves_odt_unchanged() {
    let mut h = harness();
    h.connect();
    h.ack(CommandCode::SetDaqPtr, &[0, 0, 0]);

    assert_eq!(h.write_daq(4, 0x1000).unwrap().return_code, ReturnCode::Acknowledge);
    assert_eq!(
        h.write_daq(4, 0x1004).unwrap().return_code,
        ReturnCode::ParameterOutOfRange
    );

    let odt = h.slave.session().daq.list(0).unwrap().odt(0).unwrap().clone();
    assert_eq!(odt.elements().len(), 1);
    assert_eq!(odt.len(), 4);

    // Pointer did not advance past the rejected slot
    assert_eq!(h.write_daq(2, 0x1004).unwrap().return_code, ReturnCode::Acknowledge);
    assert_eq!(h.write_daq(1, 0x1006).unwrap().return_code, ReturnCode::Acknowledge);
    assert_eq!(
        h.write_daq(1, 0x1007).unwrap().return_code,
        ReturnCode::ParameterOutOfRange
    );
}

#[test]
fn test_write_daq_rejects_invalid_size() {
    let mut h = harness();
    h.connect();
    h.ack(CommandCode::SetDaqPtr, &[0, 0, 0]);

    assert_eq!(
        h.write_daq(3, 0x1000).unwrap().return_code,
        ReturnCode::ParameterOutOfRange
    );
}

#[test]
fn test_write_daq_without_pointer() {
    let mut h = harness();
    h.connect();

    assert_eq!(
        h.write_daq(1, 0x1000).unwrap().return_code,
        ReturnCode::ParameterOutOfRange
    );
}

// =============================================================================
// DAQ transmission
// =============================================================================

#[test]
fn test_daq_emission_with_prescaler() {
    let mut h = harness();
    h.connect();
    h.configure_list_0();
    h.start_list(0, 0, 1, 2);
    assert!(h.slave.is_transmitting(0));

    h.timebase.advance_cycles(1);
    assert!(h.daq_frames().is_empty());

    h.timebase.advance_cycles(1);
    let frames = h.daq_frames();
    assert_eq!(
        frames,
        vec![
            (DTO_ID, DaqDto::new(0, vec![0x00, 0x01, 0x02, 0x03]).unwrap()),
            (DTO_ID, DaqDto::new(1, vec![0x10, 0x11]).unwrap()),
        ]
    );

    h.timebase.advance_cycles(4);
    assert_eq!(h.daq_frames().len(), 4);
}

#[test]
fn test_daq_emission_follows_memory() {
    let mut h = harness();
    h.connect();
    h.configure_list_0();
    h.start_list(0, 0, 0, 1);

    h.memory.store(0x1000, 0, &[9, 8, 7, 6]).unwrap();
    h.timebase.advance_cycles(1);

    let frames = h.daq_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].1.data, vec![9, 8, 7, 6]);
}

#[test]
fn test_daq_frame_id_from_get_daq_size() {
    let mut h = harness();
    h.connect();
    h.ack(CommandCode::GetDaqSize, &[1, 0, 0x00, 0x04, 0x00, 0x00]);
    h.ack(CommandCode::SetDaqPtr, &[1, 0, 0]);
    h.write_daq(1, 0x1005);
    h.start_list(1, 0, 0, 1);

    h.timebase.advance_cycles(1);

    assert_eq!(h.daq_frames(), vec![(0x400, DaqDto::new(4, vec![0x05]).unwrap())]);
}

#[test]
fn test_get_daq_size_without_id_restores_configured_id() {
    let mut h = harness();
    h.connect();
    h.ack(CommandCode::GetDaqSize, &[1, 0, 0x00, 0x04, 0x00, 0x00]);
    h.ack(CommandCode::GetDaqSize, &[1, 0, 0, 0, 0, 0]);
    h.ack(CommandCode::SetDaqPtr, &[1, 0, 0]);
    h.write_daq(1, 0x1005);
    h.start_list(1, 0, 0, 1);

    h.timebase.advance_cycles(1);

    assert_eq!(h.daq_frames(), vec![(DTO_ID, DaqDto::new(4, vec![0x05]).unwrap())]);
}

#[test]
fn test_stop_cancels_emission() {
    let mut h = harness();
    h.connect();
    h.configure_list_0();
    h.start_list(0, 0, 1, 1);
    h.timebase.advance_cycles(1);
    assert_eq!(h.daq_frames().len(), 2);

    h.ack(CommandCode::StartStop, &[0, 0, 0, 0, 0, 0]);
    h.timebase.advance_cycles(5);

    assert!(h.daq_frames().is_empty());
    assert!(!h.slave.is_transmitting(0));
    assert_eq!(h.timebase.active(), 0);
}

#[test]
fn test_disconnect_cancels_emission() {
    let mut h = harness();
    h.connect();
    h.configure_list_0();
    h.start_list(0, 0, 1, 1);

    h.ack(CommandCode::Disconnect, &[1, 0, 0x39, 0x00]);
    h.timebase.advance_cycles(5);

    assert!(h.daq_frames().is_empty());
    assert_eq!(h.timebase.active(), 0);
}

#[test]
fn test_start_rejects_bad_parameters() {
    let mut h = harness();
    h.connect();
    h.configure_list_0();

    for payload in [
        [1, 0, 1, 0, 0, 0],
        [1, 0, 4, 0, 1, 0],
        [1, 0, 0, 1, 1, 0],
        [3, 0, 1, 0, 1, 0],
    ] {
        assert_eq!(
            h.reject(CommandCode::StartStop, &payload),
            ReturnCode::ParameterOutOfRange
        );
    }
    assert!(!h.slave.is_transmitting(0));
}

#[test]
fn test_write_daq_into_running_list() {
    let mut h = harness();
    h.connect();
    h.configure_list_0();
    h.start_list(0, 0, 1, 1);

    h.ack(CommandCode::SetDaqPtr, &[0, 2, 0]);
    assert_eq!(
        h.write_daq(1, 0x1000).unwrap().return_code,
        ReturnCode::DaqProcessorBusy
    );
}

#[test]
fn test_prepare_then_start_all() {
    let mut h = harness();
    h.connect();
    h.configure_list_0();

    h.ack(CommandCode::StartStop, &[2, 0, 0, 0, 3, 0]);
    assert!(!h.slave.is_transmitting(0));

    h.ack(CommandCode::StartStopAll, &[1]);
    assert!(h.slave.is_transmitting(0));
    assert!(!h.slave.is_transmitting(1));

    // Armed range: ODT 0 only, every third cycle
    h.timebase.advance_cycles(3);
    let frames = h.daq_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].1.pid, 0);

    h.ack(CommandCode::StartStopAll, &[0]);
    h.timebase.advance_cycles(6);
    assert!(h.daq_frames().is_empty());
    assert_eq!(
        h.reject(CommandCode::StartStopAll, &[2]),
        ReturnCode::ParameterOutOfRange
    );
}

#[test]
fn test_busy_transport_sends_overload_event() {
    let mut h = harness();
    h.connect();
    h.configure_list_0();
    h.start_list(0, 0, 1, 1);

    h.transport.fail_next_sends(1);
    h.timebase.advance_cycles(1);

    let sent = h.transport.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id, DTO_ID);
    assert_eq!(sent[0].data, vec![0xFE, 0x01, 0, 0, 0, 0, 0, 0]);

    h.timebase.advance_cycles(1);
    assert_eq!(h.daq_frames().len(), 2);
}

#[test]
fn test_daq_on_tokio_timebase() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_time()
        .build()
        .unwrap();

    let config = SlaveConfig::default();
    let memory = Arc::new(SimulatedMemory::from_config(&config).unwrap());
    let transport = Arc::new(MockTransport::new());
    let timebase = Arc::new(TokioTimebase::new(
        runtime.handle().clone(),
        Duration::from_millis(5),
    ));
    let mut slave = CcpSlave::new(config, memory, transport.clone(), timebase).unwrap();

    let frames: [&[u8]; 4] = [
        &[0x01, 1, 0x39, 0x00],
        &[0x15, 2, 0, 0, 0],
        &[0x16, 3, 2, 0, 0x00, 0x10, 0x00, 0x00],
        &[0x06, 4, 1, 0, 0, 0, 1, 0],
    ];
    for data in frames {
        tokio_test::assert_ok!(slave.process(&CanMessage::new(CRO_ID, data.to_vec())));
    }
    let crms: Vec<_> = transport
        .take_sent()
        .into_iter()
        .filter(|frame| frame.data[0] == 0xFF)
        .collect();
    assert_eq!(crms.len(), 4);
    assert!(crms.iter().all(|crm| crm.data[1] == 0x00));

    std::thread::sleep(Duration::from_millis(60));
    tokio_test::assert_ok!(
        slave.process(&CanMessage::new(CRO_ID, vec![0x06, 5, 0, 0, 0, 0, 0, 0]))
    );
    let (crms, daq): (Vec<_>, Vec<_>) = transport
        .take_sent()
        .into_iter()
        .partition(|frame| frame.data[0] == 0xFF);
    assert_eq!(crms.len(), 1);
    assert!(daq.len() > 2);
    assert!(daq.iter().all(|frame| frame.data == vec![0x00, 0x00, 0x01]));

    std::thread::sleep(Duration::from_millis(30));
    assert!(transport.take_sent().is_empty());
}
