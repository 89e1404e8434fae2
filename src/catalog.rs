//! Remote firmware catalog: fetch, decode and filter.
//!
//! The catalog is a JSON array of image records, e.g.
//!
//! ```json
//! [{"fileVersion": 587814449, "fileSize": 197534, "manufacturerCode": 4476,
//!   "imageType": 8705, "url": "https://…/10005777-4.1-TRADFRI-light.ota"}]
//! ```
//!
//! Only `manufacturerCode` and `url` drive the sync; the remaining fields are
//! decoded for callers that want to inspect the selection.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use log::{debug, warn};
use reqwest::Client;
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{OtaError, Result};
use crate::util;

/// One record of the remote catalog.
///
/// Every field is optional and decoded on its own: a value of the wrong type
/// or out of range is logged and dropped instead of failing the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareCatalogEntry {
    #[serde(default, deserialize_with = "lenient")]
    pub manufacturer_code: Option<u16>,
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub file_version: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub image_type: Option<u16>,
    #[serde(default, deserialize_with = "lenient")]
    pub file_size: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub model_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub sha512: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value.clone()) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            warn!("ignoring catalog value {value}: {e}");
            Ok(None)
        }
    }
}

/// Decode a catalog body.
///
/// The body must be a JSON array; elements that are not objects are skipped.
pub fn decode_catalog(body: &[u8]) -> Result<Vec<FirmwareCatalogEntry>> {
    let records: Vec<Value> = serde_json::from_slice(body)?;
    let mut catalog = Vec::with_capacity(records.len());
    for (i, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<FirmwareCatalogEntry>(record) {
            Ok(entry) => catalog.push(entry),
            Err(e) => warn!("catalog record #{i} skipped: {e}"),
        }
    }
    Ok(catalog)
}

impl FirmwareCatalogEntry {
    /// Download URL, if the entry has a non-empty one.
    pub fn download_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }

    /// Local filename the image is stored under.
    pub fn filename(&self) -> Option<String> {
        self.download_url().and_then(util::filename_from_url)
    }
}

// ── Download targets ──────────────────────────────────────────────────────────

/// Catalog entries selected for download, keyed by filename.
///
/// Iteration follows first-insertion order; inserting a filename that is
/// already present replaces its entry in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadTargets {
    entries: Vec<(String, FirmwareCatalogEntry)>,
    index:   HashMap<String, usize>,
}

impl DownloadTargets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, filename: String, entry: FirmwareCatalogEntry) {
        match self.index.get(&filename) {
            Some(&i) => self.entries[i].1 = entry,
            None => {
                self.index.insert(filename.clone(), self.entries.len());
                self.entries.push((filename, entry));
            }
        }
    }

    pub fn get(&self, filename: &str) -> Option<&FirmwareCatalogEntry> {
        self.index.get(filename).map(|&i| &self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FirmwareCatalogEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Keep only the targets for which `keep(filename)` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|(name, _)| keep(name.as_str()));
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), i))
            .collect();
    }
}

// ── Filter ────────────────────────────────────────────────────────────────────

/// Select the catalog entries that apply to the known manufacturers.
///
/// Entries without a usable URL are skipped.  When several entries map to
/// the same filename the last one wins.
pub fn filter_catalog(
    catalog: &[FirmwareCatalogEntry],
    known:   &HashSet<u16>,
) -> DownloadTargets {
    let mut targets = DownloadTargets::new();
    for entry in catalog {
        let Some(url) = entry.download_url() else {
            continue;
        };
        let Some(filename) = entry.filename() else {
            warn!("catalog entry with unusable url '{url}' skipped");
            continue;
        };
        match entry.manufacturer_code {
            Some(code) if known.contains(&code) => targets.insert(filename, entry.clone()),
            _ => {}
        }
    }
    targets
}

// ── Remote client ─────────────────────────────────────────────────────────────

/// Build the HTTP client used for the catalog and image downloads.
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("zha-ota/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(OtaError::Network)
}

/// Fetches the remote firmware index.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: Client,
    url:  String,
}

impl CatalogClient {
    pub fn new(http: Client, url: impl Into<String>) -> Self {
        Self { http, url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Download and decode the catalog.  A single attempt; no retries.
    pub async fn fetch(&self) -> Result<Vec<FirmwareCatalogEntry>> {
        debug!("fetching firmware catalog {}", self.url);
        let resp = self.http.get(&self.url).send().await?.error_for_status()?;
        let body = resp.bytes().await?;
        let catalog = decode_catalog(&body)?;
        debug!("catalog lists {} image(s)", catalog.len());
        Ok(catalog)
    }
}
