//! `ota_notify`: sync firmware, refresh providers, notify a device.
//!
//! Flow:
//!   1. If requested, sync the remote catalog for the manufacturers present
//!      on the network (failures are logged, never fatal)
//!   2. Always refresh every image provider
//!   3. Run the image-notify handshake on the target device

use std::path::{Path, PathBuf};

use log::{debug, error};

use crate::config::OtaConfig;
use crate::download::{FirmwareSync, SyncReport};
use crate::error::Result;
use crate::provider::{refresh_all_providers, ProviderRegistry, RefreshReport};
use crate::zigbee::notify::{notify_device, NotificationOutcome};
use crate::zigbee::{known_manufacturer_codes, DeviceRegistry, Ieee};

/// Collaborators borrowed from the host application.
pub struct OtaContext<'a> {
    pub devices:   &'a dyn DeviceRegistry,
    pub providers: &'a ProviderRegistry,
    pub sync:      &'a FirmwareSync,
    /// Download directory used when the request names none.
    pub ota_dir:   &'a Path,
}

#[derive(Debug, Clone, Default)]
pub struct OtaNotifyRequest {
    pub ieee:     Option<Ieee>,
    /// Sync the remote catalog first.
    pub download: bool,
    /// Override of the download directory.
    pub path:     Option<PathBuf>,
}

impl OtaNotifyRequest {
    /// Request for `ieee` with the `download` flag and directory from config.
    pub fn from_config(cfg: &OtaConfig, ieee: Option<Ieee>) -> Self {
        Self {
            ieee,
            download: cfg.download,
            path:     Some(cfg.ota_dir.clone()),
        }
    }
}

#[derive(Debug)]
pub struct OtaNotifyReport {
    /// `None` when no download was requested.
    pub sync:         Option<Result<SyncReport>>,
    pub refresh:      RefreshReport,
    /// `None` when no device was given.
    pub notification: Option<NotificationOutcome>,
}

/// Run the full OTA notify command.
///
/// Only an unknown device is returned as an error.
pub async fn ota_notify(ctx: &OtaContext<'_>, req: &OtaNotifyRequest) -> Result<OtaNotifyReport> {
    let sync = if req.download {
        let dir = req.path.as_deref().unwrap_or(ctx.ota_dir);
        let known = known_manufacturer_codes(ctx.devices);
        debug!("syncing firmware for {} manufacturer(s) into {}", known.len(), dir.display());
        let result = ctx.sync.sync(&known, dir).await;
        if let Err(e) = &result {
            error!("firmware sync failed: {e}");
        }
        Some(result)
    } else {
        None
    };

    let refresh = refresh_all_providers(ctx.providers).await;

    let Some(ieee) = req.ieee else {
        error!("missing ieee");
        return Ok(OtaNotifyReport { sync, refresh, notification: None });
    };

    debug!("running 'image_notify' for {ieee}");
    let notification = notify_device(ctx.devices, &ieee).await?;
    Ok(OtaNotifyReport { sync, refresh, notification: Some(notification) })
}
