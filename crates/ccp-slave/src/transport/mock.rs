//! Mock transport for testing

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ccp_proto::CanMessage;
use parking_lot::Mutex;

use super::{CanTransport, TransportError};

/// In-memory transport recording every sent frame
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<CanMessage>>,
    incoming: Mutex<VecDeque<CanMessage>>,
    disconnected: AtomicBool,
    busy_sends: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame for `try_recv`
    pub fn inject_incoming(&self, frame: CanMessage) {
        self.incoming.lock().push_back(frame);
    }

    /// Frames sent so far
    pub fn sent(&self) -> Vec<CanMessage> {
        self.sent.lock().clone()
    }

    /// Drain the sent frames
    pub fn take_sent(&self) -> Vec<CanMessage> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Reject the next `count` sends with [`TransportError::Busy`]
    pub fn fail_next_sends(&self, count: usize) {
        self.busy_sends.store(count, Ordering::SeqCst);
    }

    /// Set connection state
    pub fn set_connected(&self, connected: bool) {
        self.disconnected.store(!connected, Ordering::SeqCst);
    }
}

impl CanTransport for MockTransport {
    fn send(&self, frame: &CanMessage) -> Result<(), TransportError> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }
        let busy = self
            .busy_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if busy {
            return Err(TransportError::Busy);
        }

        tracing::trace!(id = frame.id, data = ?frame.data, "Mock transport: sent frame");
        self.sent.lock().push(frame.clone());
        Ok(())
    }

    fn try_recv(&self) -> Result<Option<CanMessage>, TransportError> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }
        Ok(self.incoming.lock().pop_front())
    }
}
