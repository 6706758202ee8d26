//! Transport layer for CCP frames
//!
//! - SocketCAN raw socket adapter (Linux only)
//! - Mock adapter for testing

mod adapter;
pub mod error;
pub mod mock;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

pub use adapter::CanTransport;
pub use error::TransportError;
pub use mock::MockTransport;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use self::socketcan::SocketCanTransport;
