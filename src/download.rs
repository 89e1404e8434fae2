//! Firmware catalog synchronization.
//!
//! Flow:
//!   1. Scan the OTA directory for images already on disk
//!   2. Fetch the remote catalog (a single attempt)
//!   3. Keep the entries for manufacturers present on the network
//!   4. Download each selected image into the OTA directory
//!
//! Downloads are independent: a failed image is logged and the batch moves
//! on to the next one.

use std::collections::HashSet;
use std::path::Path;

use log::{debug, error, info, warn};
use reqwest::Client;

use crate::catalog::{self, CatalogClient, DownloadTargets, FirmwareCatalogEntry};
use crate::config::OtaConfig;
use crate::error::{OtaError, Result};
use crate::inventory;
use crate::util;

/// Outcome of one catalog sync.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Files written to the OTA directory.
    pub downloaded: Vec<String>,
    /// Selected files left alone because they were already on disk.
    pub skipped: Vec<String>,
    /// Files that could not be fetched or written.
    pub failures: Vec<(String, OtaError)>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Catalog sync driver.
#[derive(Debug, Clone)]
pub struct FirmwareSync {
    http:          Client,
    catalog:       CatalogClient,
    max_downloads: Option<usize>,
    skip_existing: bool,
}

impl FirmwareSync {
    pub fn new(http: Client, catalog_url: impl Into<String>) -> Self {
        Self {
            catalog: CatalogClient::new(http.clone(), catalog_url),
            http,
            max_downloads: None,
            skip_existing: false,
        }
    }

    pub fn from_config(cfg: &OtaConfig) -> Result<Self> {
        let http = catalog::build_http_client(cfg.http_timeout())?;
        Ok(Self::new(http, cfg.catalog_url.clone())
            .with_max_downloads(cfg.max_downloads)
            .with_skip_existing(cfg.skip_existing))
    }

    /// Attempt at most `max` images per sync (`None` or `Some(0)` = no limit).
    pub fn with_max_downloads(mut self, max: Option<usize>) -> Self {
        self.max_downloads = max.filter(|&n| n > 0);
        self
    }

    pub fn with_skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    /// Sync the images for `known` manufacturers into `target_dir`.
    ///
    /// Catalog fetch or decode failures abort the sync; per-image failures are
    /// collected in the report.
    pub async fn sync(&self, known: &HashSet<u16>, target_dir: &Path) -> Result<SyncReport> {
        tokio::fs::create_dir_all(target_dir).await?;
        let on_disk = inventory::scan(target_dir).await?;

        let entries = match self.catalog.fetch().await {
            Ok(c) => c,
            Err(e) => {
                error!("cannot get firmware catalog {}: {e}", self.catalog.url());
                return Err(e);
            }
        };

        let mut targets = catalog::filter_catalog(&entries, known);
        info!(
            "{} of {} catalog image(s) match {} known manufacturer(s)",
            targets.len(),
            entries.len(),
            known.len()
        );

        let mut skipped = Vec::new();
        if self.skip_existing {
            targets.retain(|name| {
                let present = on_disk.contains(name);
                if present {
                    skipped.push(name.to_string());
                }
                !present
            });
        }

        let mut report = self.download_targets(&targets, target_dir).await;
        report.skipped = skipped;
        info!(
            "firmware sync done: {} downloaded, {} skipped, {} failed",
            report.downloaded.len(),
            report.skipped.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Download `targets` in order into `target_dir`, overwriting existing files.
    pub async fn download_targets(&self, targets: &DownloadTargets, target_dir: &Path) -> SyncReport {
        let mut report = SyncReport::default();
        let limit = self.max_downloads.unwrap_or(usize::MAX);

        for (attempted, (filename, entry)) in targets.iter().enumerate() {
            if attempted >= limit {
                debug!("download limit of {limit} reached, {} image(s) left", targets.len() - attempted);
                break;
            }
            let url = entry.download_url().unwrap_or_default();
            match self.download_one(filename, entry, target_dir).await {
                Ok(size) => {
                    info!("downloaded '{url}' → {filename} ({size} bytes)");
                    report.downloaded.push(filename.to_string());
                }
                Err(e) => {
                    warn!("cannot get '{url}': {e}");
                    report.failures.push((filename.to_string(), e));
                }
            }
        }
        report
    }

    async fn download_one(
        &self,
        filename:   &str,
        entry:      &FirmwareCatalogEntry,
        target_dir: &Path,
    ) -> Result<usize> {
        let url = entry.download_url().unwrap_or_default();
        debug!("get '{url}'");
        let resp = self.http.get(url).send().await?.error_for_status()?;
        let data = resp.bytes().await?;

        let out = target_dir.join(filename);
        debug!("writing '{}'", out.display());
        util::write_atomic(&out, &data).await?;
        Ok(data.len())
    }
}
