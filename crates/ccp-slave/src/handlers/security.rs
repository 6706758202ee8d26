//! GET_SEED / UNLOCK

use ccp_proto::{Resource, ResourceMask, ReturnCode};
use tracing::{error, info, warn};

use crate::engine::{CcpSlave, HandlerResult, Outcome};
use crate::security::MAX_SEED_LEN;
use crate::session::PendingSeed;

impl CcpSlave {
    pub(crate) fn get_seed(&mut self, payload: &[u8]) -> HandlerResult {
        let resource = Resource::from_mask(payload[0]).ok_or(ReturnCode::ParameterOutOfRange)?;

        if !self.session.is_locked(resource) {
            self.session.pending_seed = None;
            return Ok(Outcome::Ack(vec![0, 0, 0, 0, 0]));
        }

        let seed = self.seed_key.seed(resource);
        if seed.len() > MAX_SEED_LEN {
            error!(len = seed.len(), max = MAX_SEED_LEN, "Seed does not fit a CRM");
            self.session.pending_seed = None;
            return Err(ReturnCode::ResourceFunctionNotAvailable);
        }
        let mut reply = vec![1];
        reply.extend_from_slice(&seed);
        self.session.pending_seed = Some(PendingSeed { resource, seed });
        Ok(Outcome::Ack(reply))
    }

    pub(crate) fn unlock(&mut self, payload: &[u8]) -> HandlerResult {
        if self.session.unlock_attempts > self.config.security.max_unlock_attempts {
            return Err(ReturnCode::AccessDenied);
        }
        let pending = self
            .session
            .pending_seed
            .clone()
            .ok_or(ReturnCode::AccessLocked)?;

        if !self.seed_key.verify(pending.resource, &pending.seed, payload) {
            self.session.unlock_attempts = self.session.unlock_attempts.saturating_add(1);
            warn!(
                resource = ?pending.resource,
                attempts = self.session.unlock_attempts,
                "Invalid key"
            );
            if self.session.unlock_attempts > self.config.security.max_unlock_attempts {
                return Err(ReturnCode::AccessDenied);
            }
            return Err(ReturnCode::AccessLocked);
        }

        self.session.locked.remove(pending.resource);
        self.session.pending_seed = None;
        self.session.unlock_attempts = 0;
        info!(resource = ?pending.resource, "Resource unlocked");

        let privileges = !self.session.locked.bits() & ResourceMask::all().bits();
        Ok(Outcome::Ack(vec![privileges]))
    }
}
