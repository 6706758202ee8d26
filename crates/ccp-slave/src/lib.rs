//! ccp-slave - CAN Calibration Protocol slave engine
//!
//! # Architecture
//!
//! ```text
//!  CanTransport ──CRO──▶ CcpSlave::receive ──▶ dispatch (CommandCode)
//!       ▲                      │                    │
//!       │                      │              handlers/*  ──▶ Memory
//!       │                      ▼                    │
//!       └────────CRM──── Crm::encode ◀── Outcome ◀──┘
//!       ▲
//!       └────DAQ DTO──── DaqScheduler ◀── Timebase ticks
//!                             │
//!                             └── ODT snapshot ──▶ Memory::read
//! ```
//!
//! Command processing is sequential per slave (`&mut self`). DAQ lists
//! transmit from tasks on the [`timebase::Timebase`], sharing the memory
//! and transport through `Arc`.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ccp_slave::{CcpSlave, SlaveConfig, SimulatedMemory, ManualTimebase, MockTransport};
//!
//! let config = SlaveConfig::default();
//! let memory = Arc::new(SimulatedMemory::from_config(&config)?);
//! let transport = Arc::new(MockTransport::new());
//! let timebase = Arc::new(ManualTimebase::new(config.base_cycle()));
//! let mut slave = CcpSlave::new(config, memory, transport.clone(), timebase)?;
//! slave.poll()?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
mod handlers;
pub mod memory;
pub mod scheduler;
pub mod security;
pub mod session;
pub mod timebase;
pub mod transport;

pub use config::SlaveConfig;
pub use engine::{CcpSlave, HandlerResult, Outcome};
pub use error::{SlaveError, SlaveResult};
pub use memory::{Memory, MemoryError, SimulatedMemory};
pub use security::{SeedKey, XorSeedKey, MAX_SEED_LEN};
pub use session::{Mta, Session, SessionState};
pub use timebase::{CancelHandle, ManualTimebase, Timebase, TokioTimebase};
pub use transport::{CanTransport, MockTransport, TransportError};

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use transport::SocketCanTransport;
