//! CAN frame codecs for CRO, CRM, DAQ and event messages

use crate::codes::{
    dto_type, CommandCode, ReturnCode, MAX_CRM_PAYLOAD, MAX_CRO_PAYLOAD, MAX_DAQ_PAYLOAD,
    MAX_FRAME_LEN,
};
use crate::error::{ProtoError, ProtoResult};
use crate::layout::describe;

/// A classic CAN data frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanMessage {
    /// Arbitration id
    pub id: u32,
    /// 29-bit identifier
    pub extended: bool,
    pub data: Vec<u8>,
}

impl CanMessage {
    /// Frame with an 11-bit id, or a 29-bit id when it does not fit
    pub fn new(id: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            extended: id > 0x7FF,
            data: data.into(),
        }
    }

    /// Frame with a 29-bit id
    pub fn extended(id: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            extended: true,
            data: data.into(),
        }
    }
}

/// Command Receive Object (master -> slave)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cro {
    /// Raw command byte, possibly not a known command
    pub command: u8,
    pub counter: u8,
    pub payload: Vec<u8>,
}

impl Cro {
    pub fn new(code: CommandCode, counter: u8, payload: impl Into<Vec<u8>>) -> ProtoResult<Self> {
        let payload = payload.into();
        if payload.len() > MAX_CRO_PAYLOAD {
            return Err(ProtoError::TooLong {
                max: MAX_CRO_PAYLOAD,
                actual: payload.len(),
            });
        }
        Ok(Self {
            command: code.into(),
            counter,
            payload,
        })
    }

    pub fn decode(data: &[u8]) -> ProtoResult<Self> {
        if data.len() < 2 {
            return Err(ProtoError::TooShort {
                expected: 2,
                actual: data.len(),
            });
        }
        if data.len() > MAX_FRAME_LEN {
            return Err(ProtoError::TooLong {
                max: MAX_FRAME_LEN,
                actual: data.len(),
            });
        }
        Ok(Self {
            command: data[0],
            counter: data[1],
            payload: data[2..].to_vec(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.payload.len());
        out.push(self.command);
        out.push(self.counter);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Decoded command code, or the raw byte when unknown
    pub fn command_code(&self) -> Result<CommandCode, u8> {
        CommandCode::try_from(self.command)
    }

    /// Human readable form for logs
    pub fn describe(&self) -> String {
        match self.command_code() {
            Ok(code) => format!("#{} {}", self.counter, describe(code, &self.payload)),
            Err(raw) => format!(
                "#{} 0x{:02X} {}",
                self.counter,
                raw,
                hex::encode(&self.payload)
            ),
        }
    }
}

/// Command Return Message (slave -> master)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crm {
    pub return_code: ReturnCode,
    pub counter: u8,
    pub payload: Vec<u8>,
}

impl Crm {
    pub fn new(
        return_code: ReturnCode,
        counter: u8,
        payload: impl Into<Vec<u8>>,
    ) -> ProtoResult<Self> {
        let payload = payload.into();
        if payload.len() > MAX_CRM_PAYLOAD {
            return Err(ProtoError::TooLong {
                max: MAX_CRM_PAYLOAD,
                actual: payload.len(),
            });
        }
        Ok(Self {
            return_code,
            counter,
            payload,
        })
    }

    /// Encoded frame, unpadded
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 + self.payload.len());
        out.push(dto_type::COMMAND_RETURN_MESSAGE);
        out.push(self.return_code.into());
        out.push(self.counter);
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn decode(data: &[u8]) -> ProtoResult<Self> {
        if data.len() < 3 {
            return Err(ProtoError::TooShort {
                expected: 3,
                actual: data.len(),
            });
        }
        let return_code =
            ReturnCode::try_from(data[1]).map_err(ProtoError::UnknownReturnCode)?;
        Self::new(return_code, data[2], &data[3..])
    }
}

/// Asynchronous event message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMessage {
    pub return_code: ReturnCode,
}

impl EventMessage {
    pub fn new(return_code: ReturnCode) -> Self {
        Self { return_code }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; MAX_FRAME_LEN];
        out[0] = dto_type::EVENT_MESSAGE;
        out[1] = self.return_code.into();
        out
    }

    pub fn decode(data: &[u8]) -> ProtoResult<Self> {
        if data.len() < 2 {
            return Err(ProtoError::TooShort {
                expected: 2,
                actual: data.len(),
            });
        }
        let return_code =
            ReturnCode::try_from(data[1]).map_err(ProtoError::UnknownReturnCode)?;
        Ok(Self { return_code })
    }
}

/// DAQ data transmission object, pid is the absolute ODT number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaqDto {
    pub pid: u8,
    pub data: Vec<u8>,
}

impl DaqDto {
    pub fn new(pid: u8, data: impl Into<Vec<u8>>) -> ProtoResult<Self> {
        let data = data.into();
        if pid >= dto_type::EVENT_MESSAGE {
            return Err(ProtoError::ReservedPid(pid));
        }
        if data.len() > MAX_DAQ_PAYLOAD {
            return Err(ProtoError::TooLong {
                max: MAX_DAQ_PAYLOAD,
                actual: data.len(),
            });
        }
        Ok(Self { pid, data })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.data.len());
        out.push(self.pid);
        out.extend_from_slice(&self.data);
        out
    }
}

/// Any slave -> master data transmission object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dto {
    Crm(Crm),
    Event(EventMessage),
    Daq(DaqDto),
}

impl Dto {
    /// Classify a frame by its packet id
    pub fn decode(data: &[u8]) -> ProtoResult<Self> {
        match data.first() {
            None => Err(ProtoError::TooShort {
                expected: 1,
                actual: 0,
            }),
            Some(&dto_type::COMMAND_RETURN_MESSAGE) => Crm::decode(data).map(Dto::Crm),
            Some(&dto_type::EVENT_MESSAGE) => EventMessage::decode(data).map(Dto::Event),
            Some(&pid) => DaqDto::new(pid, &data[1..]).map(Dto::Daq),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cro_decode() {
        let cro = Cro::decode(&[0x01, 0x05, 0x15, 0x08]).unwrap();
        assert_eq!(cro.command_code(), Ok(CommandCode::Connect));
        assert_eq!(cro.counter, 0x05);
        assert_eq!(cro.payload, vec![0x15, 0x08]);
        assert_eq!(cro.describe(), "#5 CONNECT station_address=0x0815");
    }

    #[test]
    fn test_cro_rejects_short_and_long() {
        assert_eq!(
            Cro::decode(&[0x01]),
            Err(ProtoError::TooShort {
                expected: 2,
                actual: 1
            })
        );
        assert!(Cro::decode(&[0; 9]).is_err());
        assert!(Cro::new(CommandCode::Dnload6, 0, vec![0; 7]).is_err());
    }

    #[test]
    fn test_cro_unknown_command() {
        let cro = Cro::decode(&[0xAA, 0x01, 0x02]).unwrap();
        assert_eq!(cro.command_code(), Err(0xAA));
        assert_eq!(cro.describe(), "#1 0xAA 02");
    }

    #[test]
    fn test_crm_encode_unpadded() {
        let crm = Crm::new(ReturnCode::Acknowledge, 0x05, vec![]).unwrap();
        assert_eq!(crm.encode(), vec![0xFF, 0x00, 0x05]);

        let crm = Crm::new(ReturnCode::Acknowledge, 0x06, vec![1, 2, 3, 4, 5]).unwrap();
        assert_eq!(crm.encode().len(), 8);
        assert!(Crm::new(ReturnCode::Acknowledge, 0, vec![0; 6]).is_err());
    }

    #[test]
    fn test_dto_classify() {
        assert_eq!(
            Dto::decode(&[0xFF, 0x32, 0x07]),
            Ok(Dto::Crm(Crm {
                return_code: ReturnCode::ParameterOutOfRange,
                counter: 0x07,
                payload: vec![],
            }))
        );
        assert_eq!(
            Dto::decode(&EventMessage::new(ReturnCode::DaqProcessorOverload).encode()),
            Ok(Dto::Event(EventMessage::new(ReturnCode::DaqProcessorOverload)))
        );
        assert_eq!(
            Dto::decode(&[0x03, 0xAA, 0xBB]),
            Ok(Dto::Daq(DaqDto {
                pid: 0x03,
                data: vec![0xAA, 0xBB],
            }))
        );
        assert_eq!(Dto::decode(&[0xFF, 0x99, 0x00]), Err(ProtoError::UnknownReturnCode(0x99)));
    }

    #[test]
    fn test_daq_dto_bounds() {
        assert_eq!(DaqDto::new(0xFE, vec![]), Err(ProtoError::ReservedPid(0xFE)));
        assert!(DaqDto::new(0x00, vec![0; 8]).is_err());
        assert_eq!(DaqDto::new(0x02, vec![9; 7]).unwrap().encode().len(), 8);
    }

    #[test]
    fn test_can_message_id_width() {
        assert!(!CanMessage::new(0x7E1, vec![]).extended);
        assert!(CanMessage::new(0x18DA_00F1, vec![]).extended);
        assert!(CanMessage::extended(0x10, vec![]).extended);
    }
}
