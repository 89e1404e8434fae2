//! Zigbee device model consumed by the OTA toolkit.
//!
//! The toolkit never owns the network: devices, endpoints and clusters are
//! borrowed from whatever mesh stack hosts it, through the narrow traits
//! below.  An adapter over the host library implements them.

pub mod notify;

#[cfg(test)]
pub(crate) mod fake;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;

/// Basic (device information) cluster.
pub const BASIC_CLUSTER: u16 = 0x0000;
/// OTA upgrade cluster.
pub const OTA_CLUSTER: u16 = 0x0019;
/// ZDO endpoint; never carries application clusters.
pub const ZDO_ENDPOINT: u8 = 0;

// ── IEEE address ──────────────────────────────────────────────────────────────

/// 64-bit IEEE (EUI-64) device address, most significant byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ieee(pub [u8; 8]);

#[derive(Debug, Error)]
#[error("invalid IEEE address '{0}'")]
pub struct ParseIeeeError(String);

impl FromStr for Ieee {
    type Err = ParseIeeeError;

    /// Accepts `00:0d:6f:ff:fe:a1:b2:c3` or `000d6ffffea1b2c3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseIeeeError(s.to_string());
        let hex: String = s.trim().chars().filter(|&c| c != ':').collect();
        if hex.len() != 16 || !hex.is_ascii() {
            return Err(err());
        }
        let mut bytes = [0u8; 8];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| err())?;
        }
        Ok(Ieee(bytes))
    }
}

impl fmt::Display for Ieee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

// ── ZCL status ────────────────────────────────────────────────────────────────

/// ZCL / ZDO status code returned by a cluster command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub u8);

impl Status {
    pub const SUCCESS:               Status = Status(0x00);
    pub const FAILURE:               Status = Status(0x01);
    pub const NOT_AUTHORIZED:        Status = Status(0x7e);
    pub const UNSUP_COMMAND:         Status = Status(0x81);
    pub const UNSUPPORTED_ATTRIBUTE: Status = Status(0x86);
    pub const INVALID_VALUE:         Status = Status(0x87);
    pub const TIMEOUT:               Status = Status(0x94);
    pub const NO_IMAGE_AVAILABLE:    Status = Status(0x98);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::SUCCESS               => "SUCCESS",
            Self::FAILURE               => "FAILURE",
            Self::NOT_AUTHORIZED        => "NOT_AUTHORIZED",
            Self::UNSUP_COMMAND         => "UNSUP_COMMAND",
            Self::UNSUPPORTED_ATTRIBUTE => "UNSUPPORTED_ATTRIBUTE",
            Self::INVALID_VALUE         => "INVALID_VALUE",
            Self::TIMEOUT               => "TIMEOUT",
            Self::NO_IMAGE_AVAILABLE    => "NO_IMAGE_AVAILABLE",
            _ => return None,
        })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(n) => write!(f, "{n}"),
            None    => write!(f, "0x{:02x}", self.0),
        }
    }
}

// ── Capability traits ─────────────────────────────────────────────────────────

/// Transport-level failure of a cluster request (no status came back).
#[derive(Debug, Clone, Error)]
pub enum ClusterError {
    #[error("delivery failed: {0}")]
    Delivery(String),
    #[error("no response from device")]
    Timeout,
}

pub type CommandResult = std::result::Result<Status, ClusterError>;

/// A cluster instance on a device endpoint.
#[async_trait]
pub trait Cluster: Send + Sync {
    fn cluster_id(&self) -> u16;

    /// Bind this cluster to the coordinator.
    async fn bind(&self) -> CommandResult;

    /// Configure reporting of `attribute` (intervals in seconds).
    async fn configure_reporting(
        &self,
        attribute:         &str,
        min_interval:      u16,
        max_interval:      u16,
        reportable_change: u32,
    ) -> CommandResult;

    /// OTA cluster `image_notify` command.
    async fn image_notify(&self, payload_type: u8, query_jitter: u8) -> CommandResult;
}

pub trait Endpoint: Send + Sync {
    fn endpoint_id(&self) -> u8;

    /// Client (output) cluster with id `cluster_id`.
    fn out_cluster(&self, cluster_id: u16) -> Option<&dyn Cluster>;

    /// Server (input) cluster with id `cluster_id`.
    fn in_cluster(&self, cluster_id: u16) -> Option<&dyn Cluster>;
}

pub trait Device: Send + Sync {
    fn ieee(&self) -> Ieee;

    /// 16-bit network address.
    fn nwk(&self) -> u16;

    /// Manufacturer code from the node descriptor, if known.
    fn manufacturer_code(&self) -> Option<u16>;

    /// Endpoints in ascending id order, including the ZDO endpoint.
    fn endpoints(&self) -> Vec<&dyn Endpoint>;
}

pub trait DeviceRegistry: Send + Sync {
    fn devices(&self) -> Vec<&dyn Device>;

    fn device(&self, ieee: &Ieee) -> Option<&dyn Device>;
}

/// Manufacturer codes of every device currently on the network.
pub fn known_manufacturer_codes(registry: &dyn DeviceRegistry) -> HashSet<u16> {
    registry
        .devices()
        .into_iter()
        .filter_map(|d| d.manufacturer_code())
        .collect()
}
