//! aoa-bridge CLI
//!
//! Connects to an AOA-capable USB peripheral, negotiating accessory mode if
//! needed, and bridges it to the terminal: stdin lines go out as frames,
//! received frames are printed to stdout. SIGINT/SIGTERM stop the loop and
//! close the channel cleanly.

mod config;
mod passthrough;

use anyhow::{Context, Result};
use aoa::AoaBridge;
use clap::Parser;
use config::CliConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "aoa-bridge")]
#[command(
    author,
    version,
    about = "Bridge stdin/stdout to an Android Open Accessory device"
)]
#[command(long_about = "
Bridges the terminal to a USB peripheral speaking the Android Open Accessory
protocol. If the device is not yet in accessory mode, the AOA handshake is
performed and the tool waits for the device to re-enumerate.

EXAMPLES:
    # Run with default config
    aoa-bridge

    # Target specific USB identifiers
    aoa-bridge --vendor-id 0x18d1 \\
        --unconfigured-product-id 0x4ee2 --configured-product-id 0x2d01

    # Run with debug logging
    aoa-bridge --log-level debug

CONFIGURATION:
    The tool looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/aoa-bridge/config.toml
    3. /etc/aoa-bridge/config.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// USB vendor id (hex, e.g. 0x18d1)
    #[arg(long, value_parser = parse_usb_id, value_name = "ID")]
    vendor_id: Option<u16>,

    /// Product id before the accessory handshake (hex)
    #[arg(long, value_parser = parse_usb_id, value_name = "ID")]
    unconfigured_product_id: Option<u16>,

    /// Product id in accessory mode (hex)
    #[arg(long, value_parser = parse_usb_id, value_name = "ID")]
    configured_product_id: Option<u16>,

    /// Accessory manufacturer string
    #[arg(long, value_name = "STRING")]
    manufacturer: Option<String>,

    /// Accessory model string
    #[arg(long, value_name = "STRING")]
    model: Option<String>,

    /// Accessory description string
    #[arg(long, value_name = "STRING")]
    description: Option<String>,

    /// Accessory version string
    #[arg(long, value_name = "STRING")]
    accessory_version: Option<String>,

    /// Accessory uri string
    #[arg(long, value_name = "STRING")]
    uri: Option<String>,

    /// Accessory serial string
    #[arg(long, value_name = "STRING")]
    serial: Option<String>,

    /// Delay between reconnect polls in milliseconds
    #[arg(long, value_name = "MS")]
    reconnect_cooldown_ms: Option<u64>,

    /// Number of reconnect polls before giving up
    #[arg(long, value_name = "N")]
    reconnect_attempts: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

/// Parse a USB id as hex, with or without a 0x prefix
fn parse_usb_id(s: &str) -> std::result::Result<u16, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|_| format!("'{}' is not a valid hex USB id", s))
}

fn apply_overrides(config: &mut CliConfig, args: &Args) {
    let identity = &mut config.bridge.identity;
    if let Some(id) = args.vendor_id {
        identity.vendor_id = id;
    }
    if let Some(id) = args.unconfigured_product_id {
        identity.unconfigured_product_id = id;
    }
    if let Some(id) = args.configured_product_id {
        identity.configured_product_id = id;
    }

    let accessory = &mut config.bridge.accessory;
    if let Some(ref value) = args.manufacturer {
        accessory.manufacturer = value.clone();
    }
    if let Some(ref value) = args.model {
        accessory.model = value.clone();
    }
    if let Some(ref value) = args.description {
        accessory.description = value.clone();
    }
    if let Some(ref value) = args.accessory_version {
        accessory.version = value.clone();
    }
    if let Some(ref value) = args.uri {
        accessory.uri = value.clone();
    }
    if let Some(ref value) = args.serial {
        accessory.serial = value.clone();
    }

    if let Some(ms) = args.reconnect_cooldown_ms {
        config.bridge.reconnect_cooldown_ms = ms;
    }
    if let Some(n) = args.reconnect_attempts {
        config.bridge.reconnect_attempts = n;
    }
    if let Some(ref level) = args.log_level {
        config.log_level = level.clone();
    }
}

/// Setup tracing subscriber for the application
fn setup_logging(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("Invalid log filter")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

/// Resolves when SIGINT or (on unix) SIGTERM arrives
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = term.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = CliConfig::default();
        let path = CliConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(ref path) = args.config {
        CliConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        CliConfig::load_or_default()
    };
    apply_overrides(&mut config, &args);
    config.validate()?;

    setup_logging(&config.log_level).context("Failed to setup logging")?;

    info!("aoa-bridge v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Target device {:04x}:{:04x} (accessory mode {:04x})",
        config.bridge.identity.vendor_id,
        config.bridge.identity.unconfigured_product_id,
        config.bridge.identity.configured_product_id
    );

    // USB I/O is synchronous and blocking; it runs on its own thread with an
    // explicit stop flag, while the async side only waits for signals.
    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = Arc::clone(&stop);
    let bridge_config = config.bridge.clone();

    let mut worker = tokio::task::spawn_blocking(move || -> Result<()> {
        let bridge =
            AoaBridge::open(&bridge_config).context("Failed to open accessory bridge")?;
        passthrough::run(bridge, worker_stop)
    });

    tokio::select! {
        signal = shutdown_signal() => {
            signal.context("Failed to listen for termination signals")?;
            info!("Termination signal received, stopping");
            stop.store(true, Ordering::Relaxed);
            (&mut worker).await.context("Bridge worker panicked")??;
        }
        result = &mut worker => {
            result.context("Bridge worker panicked")??;
        }
    }

    Ok(())
}
