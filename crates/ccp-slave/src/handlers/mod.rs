//! Command handlers
//!
//! Handlers validate their payload before touching any state and return
//! the CRM payload on success or the negative return code.

mod daq;
mod memory;
mod security;
mod session;
