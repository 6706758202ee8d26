//! Slave memory access
//!
//! CCP addresses memory by a 32-bit address plus an 8-bit address
//! extension. [`SimulatedMemory`] maps configured regions per extension.

use parking_lot::RwLock;
use thiserror::Error;

use ccp_proto::ReturnCode;

use crate::config::{MemoryRegionConfig, SlaveConfig};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("address 0x{address:08X} (+{len}) not mapped in extension 0x{extension:02X}")]
    OutOfRange {
        address: u32,
        extension: u8,
        len: usize,
    },

    #[error("unknown address extension 0x{0:02X}")]
    UnknownExtension(u8),

    #[error("address 0x{address:08X} in extension 0x{extension:02X} is read-only")]
    ReadOnly { address: u32, extension: u8 },
}

impl MemoryError {
    /// Return code reported to the master
    pub fn return_code(&self) -> ReturnCode {
        match self {
            MemoryError::ReadOnly { .. } => ReturnCode::AccessDenied,
            MemoryError::OutOfRange { .. } | MemoryError::UnknownExtension(_) => {
                ReturnCode::ParameterOutOfRange
            }
        }
    }
}

/// Memory as seen through CCP addressing
pub trait Memory: Send + Sync {
    fn read(&self, address: u32, extension: u8, len: usize) -> Result<Vec<u8>, MemoryError>;

    fn write(&self, address: u32, extension: u8, data: &[u8]) -> Result<(), MemoryError>;
}

#[derive(Debug, Clone)]
struct Region {
    extension: u8,
    base: u32,
    data: Vec<u8>,
    writable: bool,
}

impl Region {
    fn contains(&self, address: u32, len: usize) -> bool {
        let start = u64::from(address);
        let base = u64::from(self.base);
        start >= base && start + len as u64 <= base + self.data.len() as u64
    }

    fn offset(&self, address: u32) -> usize {
        (address - self.base) as usize
    }
}

/// Byte-array backed memory regions
#[derive(Debug, Default)]
pub struct SimulatedMemory {
    regions: RwLock<Vec<Region>>,
}

impl SimulatedMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a region, initialized with `fill` or an incrementing byte pattern
    pub fn with_region(
        self,
        extension: u8,
        base: u32,
        size: usize,
        writable: bool,
        fill: Option<u8>,
    ) -> Self {
        let data = match fill {
            Some(byte) => vec![byte; size],
            None => (0..size).map(|i| (i % 256) as u8).collect(),
        };
        self.regions.write().push(Region {
            extension,
            base,
            data,
            writable,
        });
        self
    }

    /// Regions from configuration with the identification string stored
    pub fn from_config(config: &SlaveConfig) -> Result<Self, MemoryError> {
        let memory = config
            .memory
            .iter()
            .fold(Self::new(), |memory, region: &MemoryRegionConfig| {
                memory.with_region(
                    region.extension,
                    region.base,
                    region.size,
                    region.writable,
                    region.fill,
                )
            });
        let id = &config.identification;
        memory.store(id.address, id.extension, id.device_id.as_bytes())?;
        Ok(memory)
    }

    /// ECU-side write that ignores the read-only flag
    pub fn store(&self, address: u32, extension: u8, data: &[u8]) -> Result<(), MemoryError> {
        let mut regions = self.regions.write();
        let region = Self::locate(&mut regions, address, extension, data.len())?;
        let offset = region.offset(address);
        region.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn locate<'a>(
        regions: &'a mut [Region],
        address: u32,
        extension: u8,
        len: usize,
    ) -> Result<&'a mut Region, MemoryError> {
        if !regions.iter().any(|r| r.extension == extension) {
            return Err(MemoryError::UnknownExtension(extension));
        }
        regions
            .iter_mut()
            .find(|r| r.extension == extension && r.contains(address, len))
            .ok_or(MemoryError::OutOfRange {
                address,
                extension,
                len,
            })
    }
}

impl Memory for SimulatedMemory {
    fn read(&self, address: u32, extension: u8, len: usize) -> Result<Vec<u8>, MemoryError> {
        let regions = self.regions.read();
        if !regions.iter().any(|r| r.extension == extension) {
            return Err(MemoryError::UnknownExtension(extension));
        }
        let region = regions
            .iter()
            .find(|r| r.extension == extension && r.contains(address, len))
            .ok_or(MemoryError::OutOfRange {
                address,
                extension,
                len,
            })?;
        let offset = region.offset(address);
        Ok(region.data[offset..offset + len].to_vec())
    }

    fn write(&self, address: u32, extension: u8, data: &[u8]) -> Result<(), MemoryError> {
        let mut regions = self.regions.write();
        let region = Self::locate(&mut regions, address, extension, data.len())?;
        if !region.writable {
            return Err(MemoryError::ReadOnly { address, extension });
        }
        let offset = region.offset(address);
        region.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }
}
