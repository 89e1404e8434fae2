//! Local firmware inventory.
//!
//! Lists the firmware images already present in the OTA directory so a sync
//! can tell which catalog files are new.  Files are recognized by literal,
//! case-sensitive suffix; both spellings of each extension are listed
//! explicitly because no case folding is applied.

use std::collections::BTreeMap;
use std::path::Path;

use log::debug;

use crate::error::Result;

/// File suffixes recognized as OTA images.
pub const FIRMWARE_SUFFIXES: &[&str] = &[
    ".ZIGBEE",
    ".OTA",
    ".sbl-ota",
    ".bin",
    ".ota",
    ".zigbee",
];

/// Filenames of the firmware images found in a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalInventory {
    files: BTreeMap<String, bool>,
}

impl LocalInventory {
    pub fn contains(&self, filename: &str) -> bool {
        self.files.get(filename).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Sorted filenames.
    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    fn insert(&mut self, filename: String) {
        self.files.insert(filename, true);
    }
}

/// Return `true` if `name` looks like an OTA image.
///
/// Hidden names never match, as with a shell glob, which also keeps
/// `.<name>.part` download temp files out of the inventory.
pub fn is_firmware_filename(name: &str) -> bool {
    if name.starts_with('.') {
        return false;
    }
    FIRMWARE_SUFFIXES
        .iter()
        .any(|suffix| name.len() > suffix.len() && name.ends_with(suffix))
}

/// Scan `dir` for firmware images.
///
/// A missing or unreadable directory is returned as the underlying IO error.
pub async fn scan(dir: &Path) -> Result<LocalInventory> {
    let mut inventory = LocalInventory::default();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let name = match entry.file_name().into_string() {
            Ok(n) => n,
            Err(_) => continue,
        };
        if !is_firmware_filename(&name) {
            continue;
        }
        if entry.file_type().await?.is_dir() {
            continue;
        }
        inventory.insert(name);
    }

    debug!("found {} firmware file(s) in {}", inventory.len(), dir.display());
    Ok(inventory)
}
