//! OTA toolkit configuration file parser.
//!
//! Parses a flat `key = value` file such as `/etc/zha-ota.conf`:
//!
//! ```text
//! # where firmware images are stored and served from
//! ota_dir            = /config/zigpy_ota
//! download           = true
//! max_downloads      = 0
//! manufacturer_codes = 4476, 0x1002
//! log_level          = debug
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::LevelFilter;

use crate::error::{OtaError, Result};

/// Remote index of community-maintained Zigbee OTA images.
pub const KOENKK_INDEX_URL: &str =
    "https://raw.githubusercontent.com/Koenkk/zigbee-OTA/master/index.json";

/// Default directory the OTA image providers serve from.
pub const DEFAULT_OTA_DIR: &str = "/config/zigpy_ota";

const HTTP_TIMEOUT: u64 = 60;

/// Full toolkit configuration.
#[derive(Debug, Clone)]
pub struct OtaConfig {
    // ── Storage ───────────────────────────────────────────────────────────────
    /// Directory firmware images are downloaded into.
    pub ota_dir: PathBuf,
    // ── Catalog sync ──────────────────────────────────────────────────────────
    /// JSON index listing the available firmware images.
    pub catalog_url: String,
    /// Sync the catalog before notifying a device.
    pub download: bool,
    /// Cap on catalog entries fetched per sync (`None` = unlimited).
    pub max_downloads: Option<usize>,
    /// Skip catalog entries whose file is already present in `ota_dir`.
    pub skip_existing: bool,
    /// Per-request HTTP timeout (seconds).
    pub http_timeout: u64,
    /// Manufacturer codes used when no device registry is available.
    pub manufacturer_codes: HashSet<u16>,
    // ── Process ───────────────────────────────────────────────────────────────
    pub log_syslog: bool,
    /// Most verbose level emitted; `RUST_LOG` still overrides it on stderr.
    pub log_level: LevelFilter,
}

impl Default for OtaConfig {
    fn default() -> Self {
        Self {
            ota_dir:            PathBuf::from(DEFAULT_OTA_DIR),
            catalog_url:        KOENKK_INDEX_URL.to_string(),
            download:           false,
            max_downloads:      None,
            skip_existing:      false,
            http_timeout:       HTTP_TIMEOUT,
            manufacturer_codes: HashSet::new(),
            log_syslog:         true,
            log_level:          LevelFilter::Info,
        }
    }
}

impl OtaConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }
}

/// Parse `path` as a `zha-ota.conf` key=value configuration file.
pub fn load_config(path: &Path) -> Result<OtaConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| OtaError::Config(format!("cannot read {}: {e}", path.display())))?;
    parse_config(&content)
}

/// Parse configuration text; keys are case-insensitive, unknown keys are ignored.
pub fn parse_config(content: &str) -> Result<OtaConfig> {
    let mut cfg = OtaConfig::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.splitn(2, '=');
        let key = match parts.next() {
            Some(k) => k.trim().to_ascii_lowercase(),
            None => continue,
        };
        let val = match parts.next() {
            Some(v) => v.trim().to_string(),
            None => continue,
        };
        if val.is_empty() {
            continue;
        }

        match key.as_str() {
            "ota_dir"       => cfg.ota_dir       = PathBuf::from(&val),
            "catalog_url"   => cfg.catalog_url   = val,
            "download"      => cfg.download      = parse_bool(&val),
            "max_downloads" => {
                cfg.max_downloads = match val.parse::<usize>() {
                    Ok(0) | Err(_) => None,
                    Ok(n)          => Some(n),
                };
            }
            "skip_existing" => cfg.skip_existing = parse_bool(&val),
            "http_timeout"  => cfg.http_timeout  = val.parse().unwrap_or(HTTP_TIMEOUT),
            "log_syslog"    => cfg.log_syslog    = parse_bool(&val),
            "log_level"     => {
                cfg.log_level = val
                    .parse()
                    .map_err(|_| OtaError::Config(format!("invalid log_level '{val}'")))?;
            }
            "manufacturer_codes" => {
                for code in val.split(',').map(str::trim).filter(|c| !c.is_empty()) {
                    let parsed = parse_manufacturer_code(code).ok_or_else(|| {
                        OtaError::Config(format!("invalid manufacturer code '{code}'"))
                    })?;
                    cfg.manufacturer_codes.insert(parsed);
                }
            }
            _ => {} // ignore unknown keys
        }
    }

    Ok(cfg)
}

fn parse_bool(val: &str) -> bool {
    val == "true" || val == "1" || val == "yes"
}

/// Parse a manufacturer code written in decimal (`4476`) or hex (`0x117C`).
pub fn parse_manufacturer_code(s: &str) -> Option<u16> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None      => s.parse().ok(),
    }
}

/// Validate that required fields are populated and well-formed.
pub fn validate_config(cfg: &OtaConfig) -> Result<()> {
    if cfg.ota_dir.as_os_str().is_empty() {
        return Err(OtaError::Config("ota_dir is required".into()));
    }
    if let Err(e) = url::Url::parse(&cfg.catalog_url) {
        return Err(OtaError::Config(format!("catalog_url '{}': {e}", cfg.catalog_url)));
    }
    if cfg.http_timeout == 0 {
        return Err(OtaError::Config("http_timeout must be greater than zero".into()));
    }
    Ok(())
}
