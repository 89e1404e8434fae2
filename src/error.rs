//! Error types for the OTA toolkit.

use thiserror::Error;

use crate::zigbee::Ieee;

#[derive(Debug, Error)]
pub enum OtaError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Catalog decode: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("device {0} not found")]
    DeviceNotFound(Ieee),

    #[error("Config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, OtaError>;
