//! SocketCAN raw socket transport

use std::io::ErrorKind;

use ::socketcan::{
    CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Frame, Id, Socket, StandardId,
};
use ccp_proto::{CanMessage, MAX_FRAME_LEN};
use parking_lot::Mutex;

use super::{CanTransport, TransportError};

/// Raw CAN socket in non-blocking mode
///
/// Outgoing frames are padded with zero bytes to DLC 8.
pub struct SocketCanTransport {
    interface: String,
    socket: Mutex<CanSocket>,
}

impl SocketCanTransport {
    pub fn open(interface: &str) -> Result<Self, TransportError> {
        let socket = CanSocket::open(interface).map_err(|e| {
            TransportError::ConnectionFailed(format!("Failed to open {}: {}", interface, e))
        })?;
        socket
            .set_nonblocking(true)
            .map_err(|e| TransportError::ConnectionFailed(format!("Failed to set non-blocking: {}", e)))?;

        tracing::info!(interface = %interface, "SocketCAN transport opened");

        Ok(Self {
            interface: interface.to_string(),
            socket: Mutex::new(socket),
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    fn to_frame(message: &CanMessage) -> Result<CanFrame, TransportError> {
        let id = if message.extended {
            ExtendedId::new(message.id).map(Id::Extended)
        } else {
            u16::try_from(message.id)
                .ok()
                .and_then(StandardId::new)
                .map(Id::Standard)
        }
        .ok_or_else(|| TransportError::InvalidFrame(format!("Invalid CAN ID: 0x{:X}", message.id)))?;

        let mut data = message.data.clone();
        if data.len() > MAX_FRAME_LEN {
            return Err(TransportError::SendFailed(format!(
                "Frame too long: {} bytes",
                data.len()
            )));
        }
        data.resize(MAX_FRAME_LEN, 0);

        CanFrame::new(id, &data)
            .ok_or_else(|| TransportError::SendFailed("Invalid CAN frame".to_string()))
    }
}

impl CanTransport for SocketCanTransport {
    fn send(&self, frame: &CanMessage) -> Result<(), TransportError> {
        let can_frame = Self::to_frame(frame)?;
        match self.socket.lock().write_frame(&can_frame) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Err(TransportError::Busy),
            Err(e) => Err(TransportError::SendFailed(e.to_string())),
        }
    }

    fn try_recv(&self) -> Result<Option<CanMessage>, TransportError> {
        match self.socket.lock().read_frame() {
            Ok(CanFrame::Data(frame)) => Ok(Some(CanMessage {
                id: frame.raw_id(),
                extended: frame.is_extended(),
                data: frame.data().to_vec(),
            })),
            // Remote and error frames carry no CRO
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(TransportError::ReceiveFailed(e.to_string())),
        }
    }
}
