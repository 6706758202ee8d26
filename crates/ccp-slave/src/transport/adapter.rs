//! CAN transport trait

use ccp_proto::CanMessage;

use super::TransportError;

/// Frame-level access to a CAN bus
///
/// Both operations are non-blocking. A full transmit queue is reported as
/// [`TransportError::Busy`]; frames are never retransmitted.
pub trait CanTransport: Send + Sync {
    /// Queue a frame for transmission
    fn send(&self, frame: &CanMessage) -> Result<(), TransportError>;

    /// Next received frame, `None` when nothing is pending
    fn try_recv(&self) -> Result<Option<CanMessage>, TransportError>;
}
