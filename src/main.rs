//! Zigbee OTA firmware sync tool.
//!
//! Usage:
//!   zha-ota -c /etc/zha-ota.conf sync --manufacturer 4476
//!   zha-ota -c /etc/zha-ota.conf --stderr inventory   # log to stderr

use std::collections::HashSet;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{debug, info, LevelFilter};

use zha_ota::config::{self, OtaConfig};
use zha_ota::{inventory, refresh_all_providers, DirectoryImageProvider, FirmwareSync, ProviderRegistry};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "zha-ota", about = "Zigbee OTA firmware catalog sync")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", default_value = "/etc/zha-ota.conf")]
    config: PathBuf,

    /// Log to stderr instead of syslog (useful for debugging).
    #[arg(long)]
    stderr: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download catalog images for the given manufacturers.
    Sync {
        /// Target directory (defaults to `ota_dir`).
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Manufacturer code, decimal or 0x-hex; repeatable.
        #[arg(short = 'm', long = "manufacturer", value_parser = parse_code)]
        manufacturers: Vec<u16>,

        /// Attempt at most N images (0 = unlimited).
        #[arg(long)]
        max_downloads: Option<usize>,

        /// Leave images that are already on disk alone.
        #[arg(long)]
        skip_existing: bool,
    },
    /// List the firmware images in the OTA directory.
    Inventory {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

fn parse_code(s: &str) -> Result<u16, String> {
    config::parse_manufacturer_code(s).ok_or_else(|| format!("invalid manufacturer code '{s}'"))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = if cli.config.exists() {
        match config::load_config(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("zha-ota: config error: {e}");
                process::exit(1);
            }
        }
    } else {
        OtaConfig::default()
    };
    if let Err(e) = config::validate_config(&cfg) {
        eprintln!("zha-ota: config validation: {e}");
        process::exit(1);
    }

    let use_syslog = cfg.log_syslog && !cli.stderr;
    if let Err(e) = setup_logging(use_syslog, cfg.log_level) {
        eprintln!("zha-ota: {e}");
        process::exit(1);
    }

    if let Err(e) = run(cli.command, cfg).await {
        eprintln!("zha-ota: {e:#}");
        process::exit(1);
    }
}

async fn run(command: Command, cfg: OtaConfig) -> anyhow::Result<()> {
    match command {
        Command::Sync { dir, manufacturers, max_downloads, skip_existing } => {
            let dir = dir.unwrap_or_else(|| cfg.ota_dir.clone());
            let known: HashSet<u16> = if manufacturers.is_empty() {
                cfg.manufacturer_codes.clone()
            } else {
                manufacturers.into_iter().collect()
            };
            if known.is_empty() {
                anyhow::bail!("no manufacturer codes given (use --manufacturer or manufacturer_codes)");
            }

            let sync = FirmwareSync::from_config(&cfg)?
                .with_max_downloads(max_downloads.or(cfg.max_downloads))
                .with_skip_existing(skip_existing || cfg.skip_existing);

            let report = sync
                .sync(&known, &dir)
                .await
                .with_context(|| format!("syncing {}", cfg.catalog_url))?;

            let mut providers = ProviderRegistry::new();
            providers.register(Arc::new(DirectoryImageProvider::new(&dir)));
            let refresh = refresh_all_providers(&providers).await;
            info!("provider refresh: {} ok, {} failed", refresh.succeeded, refresh.failed.len());

            for name in &report.downloaded {
                println!("downloaded {name}");
            }
            for name in &report.skipped {
                println!("skipped    {name}");
            }
            for (name, e) in &report.failures {
                println!("failed     {name}: {e}");
            }
            if !report.is_clean() {
                anyhow::bail!("{} image(s) failed to download", report.failures.len());
            }
        }
        Command::Inventory { dir } => {
            let dir = dir.unwrap_or(cfg.ota_dir);
            let inv = inventory::scan(&dir)
                .await
                .with_context(|| format!("scanning {}", dir.display()))?;
            for name in inv.filenames() {
                println!("{name}");
            }
        }
    }
    Ok(())
}

// ── Logging setup ─────────────────────────────────────────────────────────────

fn setup_logging(use_syslog: bool, level: LevelFilter) -> anyhow::Result<()> {
    if use_syslog {
        let formatter = syslog::Formatter3164 {
            facility: syslog::Facility::LOG_USER,
            hostname: None,
            process:  env!("CARGO_PKG_NAME").into(),
            pid:      process::id(),
        };
        let logger = syslog::unix(formatter)
            .map_err(|e| anyhow::anyhow!("cannot reach local syslog (try --stderr): {e}"))?;
        log::set_boxed_logger(Box::new(syslog::BasicLogger::new(logger)))
            .map_err(|e| anyhow::anyhow!("logger already installed: {e}"))?;
        log::set_max_level(level);
    } else {
        env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .format_timestamp(None)
            .init();
    }
    debug!("logging at {level} to {}", if use_syslog { "syslog" } else { "stderr" });
    Ok(())
}
