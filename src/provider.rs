//! OTA image providers and the refresh dispatcher.
//!
//! A provider owns a list of firmware images it can serve to devices.  After
//! a catalog sync every registered provider is told to reload its list so
//! the new files become servable.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use log::{debug, info, warn};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::inventory::{self, LocalInventory};

#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Identifier used in logs and refresh reports.
    fn id(&self) -> &str;

    /// Reload the list of firmware images.  Must be idempotent.
    async fn refresh_firmware_list(&self) -> Result<()>;
}

/// The image providers known to the application.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ImageProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn ImageProvider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Outcome of [`refresh_all_providers`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub succeeded: usize,
    /// Ids of the providers whose refresh failed.
    pub failed: Vec<String>,
}

/// Refresh every provider concurrently.  A failing provider is logged and
/// reported; it never keeps the others from refreshing.
pub async fn refresh_all_providers(registry: &ProviderRegistry) -> RefreshReport {
    let results = join_all(registry.providers.iter().map(|p| async move {
        (p.id(), p.refresh_firmware_list().await)
    }))
    .await;

    let mut report = RefreshReport::default();
    for (id, result) in results {
        match result {
            Ok(()) => {
                debug!("provider {id}: firmware list refreshed");
                report.succeeded += 1;
            }
            Err(e) => {
                warn!("provider {id}: refresh failed: {e}");
                report.failed.push(id.to_string());
            }
        }
    }
    info!(
        "refreshed {} of {} image provider(s)",
        report.succeeded,
        registry.len()
    );
    report
}

// ── Directory provider ────────────────────────────────────────────────────────

/// Serves the firmware files found in one directory.
pub struct DirectoryImageProvider {
    id:     String,
    dir:    PathBuf,
    images: RwLock<LocalInventory>,
}

impl DirectoryImageProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            id: format!("dir:{}", dir.display()),
            dir,
            images: RwLock::new(LocalInventory::default()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Images found by the last refresh.
    pub async fn images(&self) -> LocalInventory {
        self.images.read().await.clone()
    }
}

#[async_trait]
impl ImageProvider for DirectoryImageProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn refresh_firmware_list(&self) -> Result<()> {
        let found = inventory::scan(&self.dir).await?;
        debug!("{}: {} image(s)", self.id, found.len());
        *self.images.write().await = found;
        Ok(())
    }
}
