//! ccp-proto - CAN Calibration Protocol registry and wire codecs
//!
//! This crate holds everything about CCP that is fixed by the protocol
//! itself and shared read-only between slave instances:
//!
//! - [`codes`] - command codes, return codes and their severity classes,
//!   DTO types, resource and session status bits
//! - [`layout`] - documented CRO payload layouts per command
//! - [`frame`] - CRO / CRM / DAQ / event frame encoding and decoding
//!
//! # Frame layout
//!
//! ```text
//! CRO  [cmd] [ctr] [payload 0..6 bytes          ]
//! CRM  [FF ] [rc ] [ctr] [payload 0..5 bytes    ]
//! EVM  [FE ] [rc ] [00 00 00 00 00 00           ]
//! DAQ  [pid] [packed element values 0..7 bytes  ]
//! ```

pub mod codes;
pub mod error;
pub mod frame;
pub mod layout;

pub use codes::{
    dto_type, session_status, CommandCode, ErrorClass, Resource, ResourceMask, ReturnCode,
    StartStopMode, CCP_VERSION, MAX_CRM_PAYLOAD, MAX_CRO_PAYLOAD, MAX_DAQ_PAYLOAD, MAX_FRAME_LEN,
};
pub use error::{ProtoError, ProtoResult};
pub use frame::{CanMessage, Crm, Cro, DaqDto, Dto, EventMessage};
pub use layout::{describe, ByteOrder, PayloadField};
