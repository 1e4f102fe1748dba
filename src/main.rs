use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tracing::{info, warn};

use serial_gamepad_bridge::bridge::Bridge;
use serial_gamepad_bridge::config::BridgeConfig;
use serial_gamepad_bridge::devices::VirtualGamepad;
use serial_gamepad_bridge::framing::FrameReceiver;
use serial_gamepad_bridge::router::InputRouter;
use serial_gamepad_bridge::serial::SerialByteSource;

#[derive(Parser)]
#[command(name = "serial-gamepad-bridge")]
#[command(about = "Drive a virtual gamepad from a serial remote controller")]
struct Cli {
    /// Config file path (default: ~/.config/serial-gamepad-bridge/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device, e.g. /dev/rfcomm0 (overrides the config file)
    #[arg(short, long)]
    port: Option<String>,

    /// Line speed (overrides the config file)
    #[arg(short, long)]
    baud_rate: Option<u32>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    print_default_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_default_config {
        print!("{}", BridgeConfig::default().to_toml()?);
        return Ok(());
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config_path = cli.config.unwrap_or_else(BridgeConfig::default_path);
    info!("Loading config from {:?}", config_path);
    let mut config = BridgeConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(port) = cli.port {
        config.serial.port = port;
    }
    if let Some(baud_rate) = cli.baud_rate {
        config.serial.baud_rate = baud_rate;
    }

    let mapping = config.mapping()?;
    let mut gamepad = VirtualGamepad::new(
        &config.device_name,
        &mapping,
        config.axes.scaling,
        config.axes.neutral,
    )
    .context("creating virtual gamepad (is /dev/uinput writable?)")?;
    info!("Created virtual gamepad: {}", config.device_name);
    if let Some(path) = gamepad.device_path() {
        info!("Device path: {}", path.display());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let source = SerialByteSource::open(&config.serial, shutdown.clone())
        .with_context(|| format!("opening serial port {}", config.serial.port))?;

    let router = InputRouter::new(
        mapping,
        Box::new(gamepad),
        config.router_settings(),
        Handle::current(),
    );
    let receiver = FrameReceiver::new(source, config.framing.mode, config.framing.read_chunk);
    let bridge = Bridge::new(receiver, router, config.framing.endianness);

    let mut worker = tokio::task::spawn_blocking(move || bridge.run());

    let joined = tokio::select! {
        joined = &mut worker => joined,
        signal = tokio::signal::ctrl_c() => {
            shutdown.store(true, Ordering::SeqCst);
            match signal {
                Ok(()) => info!("Ctrl-C received, shutting down"),
                Err(e) => warn!("Signal handler failed, shutting down: {}", e),
            }
            worker.await
        }
    };

    let stats = joined.context("bridge worker panicked")??;
    info!(
        packets = stats.packets,
        dropped = stats.framing_errors + stats.invalid_controls + stats.invalid_values,
        "Serial gamepad bridge stopped"
    );
    Ok(())
}
