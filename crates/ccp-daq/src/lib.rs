//! ccp-daq - DAQ list model for CCP slaves
//!
//! ```text
//! DaqTable
//!   ├── pointer (list, odt, element)   <- SET_DAQ_PTR
//!   └── DaqList[n]  (first pid, frame id, mode, transmission)
//!         └── Odt[m]  (pid = first pid + m, <= 7 payload bytes)
//!               └── Element[k]  (address, extension, size, conversion)
//! ```
//!
//! Elements are placed with WRITE_DAQ, ODTs are sampled into DAQ frames
//! by the slave's scheduler and decoded back into named values by
//! measurement tooling.

pub mod element;
pub mod error;
pub mod list;
pub mod odt;

pub use element::{is_valid_size, Element};
pub use error::{DaqError, DaqResult};
pub use list::{DaqList, DaqPointer, DaqTable, ListMode, Transmission};
pub use odt::Odt;
