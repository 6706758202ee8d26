//! Slave errors

use ccp_proto::ProtoError;
use thiserror::Error;

use crate::memory::MemoryError;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum SlaveError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtoError),
}

pub type SlaveResult<T> = Result<T, SlaveError>;
