//! Memory transfer commands

use ccp_proto::{ReturnCode, MAX_CRM_PAYLOAD, MAX_CRO_PAYLOAD};
use crc::{Crc, CRC_32_ISO_HDLC};
use tracing::{debug, warn};

use crate::engine::{le_u32, CcpSlave, HandlerResult, Outcome};
use crate::memory::MemoryError;
use crate::session::Mta;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Size of the checksum in a BUILD_CHKSUM reply
const CHECKSUM_SIZE: u8 = 4;

fn memory_fault(mta: Mta, e: MemoryError) -> ReturnCode {
    warn!(
        address = format!("0x{:08X}", mta.address),
        extension = mta.extension,
        error = %e,
        "Memory access failed"
    );
    e.return_code()
}

impl CcpSlave {
    pub(crate) fn set_mta(&mut self, payload: &[u8]) -> HandlerResult {
        let mta = Mta::new(le_u32(payload, 0), payload[4]);
        let number = payload.get(5).copied().unwrap_or(0);
        let register = self
            .session
            .mta
            .get_mut(usize::from(number))
            .ok_or(ReturnCode::ParameterOutOfRange)?;
        *register = mta;
        debug!(
            mta = number,
            address = format!("0x{:08X}", mta.address),
            extension = mta.extension,
            "MTA set"
        );
        Ok(Outcome::ack())
    }

    /// DNLOAD and PROGRAM: `[size, data...]`
    pub(crate) fn dnload(&mut self, payload: &[u8]) -> HandlerResult {
        let size = usize::from(payload[0]);
        if size > MAX_CRM_PAYLOAD {
            return Err(ReturnCode::ParameterOutOfRange);
        }
        let data = payload.get(1..1 + size).ok_or(ReturnCode::CommandSyntax)?;
        self.download(data)
    }

    /// DNLOAD_6 and PROGRAM_6
    pub(crate) fn dnload_6(&mut self, payload: &[u8]) -> HandlerResult {
        self.download(&payload[..MAX_CRO_PAYLOAD])
    }

    fn download(&mut self, data: &[u8]) -> HandlerResult {
        let mta = self.session.mta[0];
        self.memory
            .write(mta.address, mta.extension, data)
            .map_err(|e| memory_fault(mta, e))?;
        self.session.mta[0].advance(data.len());
        Ok(Outcome::Ack(self.session.mta[0].to_bytes()))
    }

    pub(crate) fn upload(&mut self, payload: &[u8]) -> HandlerResult {
        let size = usize::from(payload[0]);
        if size > MAX_CRM_PAYLOAD {
            return Err(ReturnCode::ParameterOutOfRange);
        }
        let mta = self.session.mta[0];
        let data = self
            .memory
            .read(mta.address, mta.extension, size)
            .map_err(|e| memory_fault(mta, e))?;
        self.session.mta[0].advance(size);
        Ok(Outcome::Ack(data))
    }

    pub(crate) fn short_up(&mut self, payload: &[u8]) -> HandlerResult {
        let size = usize::from(payload[0]);
        if size > MAX_CRM_PAYLOAD {
            return Err(ReturnCode::ParameterOutOfRange);
        }
        let location = Mta::new(le_u32(payload, 2), payload[1]);
        let data = self
            .memory
            .read(location.address, location.extension, size)
            .map_err(|e| memory_fault(location, e))?;
        Ok(Outcome::Ack(data))
    }

    pub(crate) fn build_chksum(&mut self, payload: &[u8]) -> HandlerResult {
        let size = le_u32(payload, 0) as usize;
        let mta = self.session.mta[0];
        let block = self
            .memory
            .read(mta.address, mta.extension, size)
            .map_err(|e| memory_fault(mta, e))?;
        let checksum = CRC32.checksum(&block);
        debug!(size, checksum = format!("0x{:08X}", checksum), "Checksum built");

        let mut reply = vec![CHECKSUM_SIZE];
        reply.extend_from_slice(&checksum.to_le_bytes());
        Ok(Outcome::Ack(reply))
    }

    pub(crate) fn clear_memory(&mut self, payload: &[u8]) -> HandlerResult {
        let size = le_u32(payload, 0) as usize;
        let mta = self.session.mta[0];
        // Range check before allocating the erase pattern
        let block = self
            .memory
            .read(mta.address, mta.extension, size)
            .map_err(|e| memory_fault(mta, e))?;
        self.memory
            .write(mta.address, mta.extension, &vec![0xFF; block.len()])
            .map_err(|e| memory_fault(mta, e))?;
        debug!(size, "Memory cleared");
        Ok(Outcome::ack())
    }

    pub(crate) fn move_block(&mut self, payload: &[u8]) -> HandlerResult {
        let size = le_u32(payload, 0) as usize;
        let [source, target] = self.session.mta;
        let block = self
            .memory
            .read(source.address, source.extension, size)
            .map_err(|e| memory_fault(source, e))?;
        self.memory
            .write(target.address, target.extension, &block)
            .map_err(|e| memory_fault(target, e))?;
        Ok(Outcome::ack())
    }

    pub(crate) fn select_cal_page(&mut self) -> HandlerResult {
        self.session.active_cal_page = Some(self.session.mta[0]);
        Ok(Outcome::ack())
    }

    pub(crate) fn get_active_cal_page(&mut self) -> HandlerResult {
        let page = self.session.active_cal_page.unwrap_or_default();
        Ok(Outcome::Ack(page.to_bytes()))
    }
}
