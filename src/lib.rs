//! Zigbee OTA toolkit.
//!
//! Keeps a local OTA directory in step with the community firmware index for
//! the manufacturers present on the network, refreshes the image providers
//! that serve it, and prompts devices to query for new images.

pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod inventory;
pub mod ota;
pub mod provider;
pub mod util;
pub mod zigbee;

pub use catalog::{decode_catalog, filter_catalog, CatalogClient, DownloadTargets, FirmwareCatalogEntry};
pub use config::OtaConfig;
pub use download::{FirmwareSync, SyncReport};
pub use error::{OtaError, Result};
pub use ota::{ota_notify, OtaContext, OtaNotifyReport, OtaNotifyRequest};
pub use provider::{refresh_all_providers, DirectoryImageProvider, ImageProvider, ProviderRegistry, RefreshReport};
pub use zigbee::notify::{notify_device, NotificationOutcome, StepOutcome};
