//! Slave configuration
//!
//! Everything a CCP slave needs to know about itself: addressing on the
//! bus, identification, protection, the static DAQ list layout, the
//! memory map and the measurement catalog used to describe DAQ elements.

use std::time::Duration;

use ccp_daq::{is_valid_size, Element};
use ccp_proto::{CommandCode, Resource};
use serde::{Deserialize, Serialize};

use crate::error::{SlaveError, SlaveResult};

/// Complete slave configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaveConfig {
    /// Station address the master connects to
    #[serde(
        default = "default_station_address",
        deserialize_with = "deserialize_hex_u16"
    )]
    pub station_address: u16,

    /// CAN id of incoming CROs
    #[serde(default = "default_cro_id", deserialize_with = "deserialize_hex_u32")]
    pub cro_id: u32,

    /// CAN id of outgoing CRMs and event messages
    #[serde(default = "default_dto_id", deserialize_with = "deserialize_hex_u32")]
    pub dto_id: u32,

    /// CAN interface name
    #[serde(default = "default_interface")]
    pub interface: String,

    #[serde(default)]
    pub identification: IdentificationConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub daq: DaqConfig,

    /// Memory map
    #[serde(default = "default_memory")]
    pub memory: Vec<MemoryRegionConfig>,

    /// Known measurements, matched by address and extension on WRITE_DAQ
    #[serde(default)]
    pub measurements: Vec<MeasurementConfig>,

    /// Optional commands answered with RESOURCE_FUNCTION_NOT_AVAILABLE
    #[serde(default)]
    pub disabled_commands: Vec<CommandCode>,
}

fn default_station_address() -> u16 {
    0x0039
}

fn default_cro_id() -> u32 {
    0x7E1
}

fn default_dto_id() -> u32 {
    0x321
}

fn default_interface() -> String {
    "vcan0".to_string()
}

fn default_memory() -> Vec<MemoryRegionConfig> {
    vec![
        MemoryRegionConfig {
            extension: 0,
            base: 0x0000_1000,
            size: 0x1000,
            writable: true,
            fill: None,
        },
        MemoryRegionConfig {
            extension: 0,
            base: default_identification_address(),
            size: 0x100,
            writable: false,
            fill: Some(0),
        },
    ]
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            station_address: default_station_address(),
            cro_id: default_cro_id(),
            dto_id: default_dto_id(),
            interface: default_interface(),
            identification: IdentificationConfig::default(),
            security: SecurityConfig::default(),
            daq: DaqConfig::default(),
            memory: default_memory(),
            measurements: Vec::new(),
            disabled_commands: Vec::new(),
        }
    }
}

impl SlaveConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &str) -> SlaveResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn load_yaml(path: &str) -> SlaveResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency
    pub fn validate(&self) -> SlaveResult<()> {
        let invalid = |msg: String| Err(SlaveError::InvalidConfig(msg));

        if self.daq.base_cycle_ms == 0 {
            return invalid("daq.base_cycle_ms must be at least 1".to_string());
        }

        let mut pids: Vec<(u16, u16, usize)> = Vec::new();
        for (number, list) in self.daq.lists.iter().enumerate() {
            if list.odt_count == 0 {
                return invalid(format!("DAQ list {} has no ODTs", number));
            }
            let first = u16::from(list.first_pid);
            let end = first + u16::from(list.odt_count);
            if end > 0xFE {
                return invalid(format!(
                    "DAQ list {} pids 0x{:02X}..0x{:02X} reach reserved range",
                    number, first, end
                ));
            }
            if let Some((_, _, other)) = pids.iter().find(|(s, e, _)| first < *e && *s < end) {
                return invalid(format!(
                    "DAQ list {} pids overlap DAQ list {}",
                    number, other
                ));
            }
            pids.push((first, end, number));
        }
        if self.daq.lists.len() > usize::from(u8::MAX) {
            return invalid("too many DAQ lists".to_string());
        }

        if let Some(code) = self.disabled_commands.iter().find(|c| c.is_mandatory()) {
            return invalid(format!("mandatory command {} cannot be disabled", code));
        }

        if let Some(m) = self
            .measurements
            .iter()
            .find(|m| !is_valid_size(m.element.size))
        {
            return invalid(format!(
                "measurement {} has invalid size {}",
                m.element.name, m.element.size
            ));
        }

        if self.identification.device_id.len() > usize::from(u8::MAX) {
            return invalid("identification.device_id longer than 255 bytes".to_string());
        }

        self.security.secret_bytes()?;
        Ok(())
    }

    /// DAQ base cycle
    pub fn base_cycle(&self) -> Duration {
        Duration::from_millis(self.daq.base_cycle_ms)
    }

    /// Catalog entry at a memory location
    pub fn measurement_at(&self, address: u32, extension: u8) -> Option<&MeasurementConfig> {
        self.measurements
            .iter()
            .find(|m| m.element.is_at(address, extension))
    }
}

/// Slave identification returned through EXCHANGE_ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentificationConfig {
    /// ASCII device id stored in slave memory
    #[serde(default = "default_device_id")]
    pub device_id: String,

    #[serde(
        default = "default_identification_address",
        deserialize_with = "deserialize_hex_u32"
    )]
    pub address: u32,

    #[serde(default)]
    pub extension: u8,
}

fn default_device_id() -> String {
    "CCP_SIM".to_string()
}

fn default_identification_address() -> u32 {
    0x0000_F000
}

impl Default for IdentificationConfig {
    fn default() -> Self {
        Self {
            device_id: default_device_id(),
            address: default_identification_address(),
            extension: 0,
        }
    }
}

/// Seed & key configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Shared secret for the XOR seed/key algorithm (hex string)
    #[serde(default = "default_secret")]
    pub secret: String,

    /// Failed UNLOCK attempts tolerated before ACCESS_DENIED
    #[serde(default = "default_max_unlock_attempts")]
    pub max_unlock_attempts: u8,

    /// Resources locked at session start
    #[serde(default = "default_protected")]
    pub protected: Vec<Resource>,
}

fn default_secret() -> String {
    "ff".to_string()
}

fn default_max_unlock_attempts() -> u8 {
    3
}

fn default_protected() -> Vec<Resource> {
    vec![Resource::Pgm]
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret: default_secret(),
            max_unlock_attempts: default_max_unlock_attempts(),
            protected: default_protected(),
        }
    }
}

impl SecurityConfig {
    /// Secret bytes, accepts "DEADBEEF" or "0xDEADBEEF"
    pub fn secret_bytes(&self) -> SlaveResult<Vec<u8>> {
        let s = self.secret.trim();
        let s = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        hex::decode(s)
            .map_err(|e| SlaveError::InvalidConfig(format!("Invalid security secret: {}", e)))
    }
}

/// Static DAQ list layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaqConfig {
    /// Base cycle; a list period is prescaler times this
    #[serde(default = "default_base_cycle_ms")]
    pub base_cycle_ms: u64,

    #[serde(default = "default_lists")]
    pub lists: Vec<DaqListConfig>,
}

fn default_base_cycle_ms() -> u64 {
    10
}

fn default_lists() -> Vec<DaqListConfig> {
    vec![
        DaqListConfig {
            odt_count: 4,
            first_pid: 0x00,
            can_id: None,
        },
        DaqListConfig {
            odt_count: 4,
            first_pid: 0x04,
            can_id: None,
        },
    ]
}

impl Default for DaqConfig {
    fn default() -> Self {
        Self {
            base_cycle_ms: default_base_cycle_ms(),
            lists: default_lists(),
        }
    }
}

/// One DAQ list, numbered by position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaqListConfig {
    pub odt_count: u8,

    pub first_pid: u8,

    /// DAQ frame id, defaults to the DTO id
    #[serde(default, deserialize_with = "deserialize_optional_hex_u32")]
    pub can_id: Option<u32>,
}

/// Mapped memory region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRegionConfig {
    #[serde(default)]
    pub extension: u8,

    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub base: u32,

    pub size: usize,

    #[serde(default = "default_writable")]
    pub writable: bool,

    /// Initial byte, incrementing pattern when absent
    #[serde(default)]
    pub fill: Option<u8>,
}

fn default_writable() -> bool {
    true
}

/// Measurement catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementConfig {
    #[serde(flatten)]
    pub element: Element,

    /// Whether the simulator varies this value over time
    #[serde(default)]
    pub varies: bool,

    /// Largest physical change per update
    #[serde(default = "default_variation")]
    pub variation: f64,
}

fn default_variation() -> f64 {
    1.0
}

// =============================================================================
// Hex Parsing Helpers
// =============================================================================

fn parse_hex_u32(s: &str) -> Result<u32, std::num::ParseIntError> {
    let s = s.trim();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(s, 16)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HexOrInt {
    Hex(String),
    Int(u32),
}

impl HexOrInt {
    fn value<E: serde::de::Error>(self) -> Result<u32, E> {
        match self {
            HexOrInt::Int(n) => Ok(n),
            HexOrInt::Hex(s) => parse_hex_u32(&s).map_err(|e| E::custom(e.to_string())),
        }
    }
}

/// Deserialize a hex u32 (supports "0x7E1" or 2017)
fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    HexOrInt::deserialize(deserializer)?.value()
}

/// Deserialize an optional hex u32
fn deserialize_optional_hex_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<HexOrInt>::deserialize(deserializer)?
        .map(HexOrInt::value)
        .transpose()
}

/// Deserialize a hex u16 (supports "0x0815" or 2069)
fn deserialize_hex_u16<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let value = HexOrInt::deserialize(deserializer)?.value()?;
    u16::try_from(value).map_err(|e| D::Error::custom(e.to_string()))
}
