//! CCP Slave Simulator
//!
//! Runs a CCP slave on a SocketCAN interface for calibration tool and
//! measurement pipeline development.
//!
//! # Usage
//!
//! Defaults on vcan0:
//! ```bash
//! ./ccp-sim --interface vcan0
//! ```
//!
//! With config file (TOML, or YAML by extension):
//! ```bash
//! ./ccp-sim --config config/ccp-sim.toml
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ccp_slave::{CcpSlave, SimulatedMemory, SlaveConfig, SocketCanTransport, TokioTimebase};
use clap::Parser;
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod simulation;

use simulation::MeasurementSimulator;

/// Measurement update period
const UPDATE_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "ccp-sim")]
#[command(about = "CCP slave simulator on SocketCAN")]
struct Args {
    /// Configuration file path (TOML or YAML)
    /// If provided, overrides command-line options
    #[arg(short, long)]
    config: Option<String>,

    /// CAN interface name
    #[arg(short, long, default_value = "vcan0")]
    interface: String,

    /// CRO CAN ID (master sends commands on this)
    #[arg(long, default_value = "0x7E1")]
    cro_id: String,

    /// DTO CAN ID (slave answers on this)
    #[arg(long, default_value = "0x321")]
    dto_id: String,

    /// Station address
    #[arg(long, default_value = "0x0039")]
    station_address: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Seed & key shared secret (hex string, e.g., "deadbeef")
    #[arg(long, default_value = "ff")]
    security_secret: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "ccp_sim=debug,ccp_slave=debug"
    } else {
        "ccp_sim=info,ccp_slave=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = if let Some(config_path) = &args.config {
        info!("Loading config from: {}", config_path);
        load_config(config_path)?
    } else {
        let mut config = SlaveConfig::default();
        config.interface = args.interface.clone();
        config.cro_id = parse_hex(&args.cro_id).context("Invalid CRO id")?;
        config.dto_id = parse_hex(&args.dto_id).context("Invalid DTO id")?;
        config.station_address = u16::try_from(
            parse_hex(&args.station_address).context("Invalid station address")?,
        )
        .context("Station address exceeds 16 bits")?;
        config.security.secret = args.security_secret.clone();
        config.validate()?;
        config
    };

    info!("Starting CCP Slave Simulator");
    info!(
        interface = %config.interface,
        cro_id = format!("0x{:X}", config.cro_id),
        dto_id = format!("0x{:X}", config.dto_id),
        station = format!("0x{:04X}", config.station_address),
        daq_lists = config.daq.lists.len(),
        base_cycle_ms = config.daq.base_cycle_ms
    );
    if !config.disabled_commands.is_empty() {
        info!(disabled = ?config.disabled_commands, "Optional commands disabled");
    }

    let memory = Arc::new(SimulatedMemory::from_config(&config)?);
    let transport = Arc::new(SocketCanTransport::open(&config.interface)?);
    let timebase = Arc::new(TokioTimebase::current(config.base_cycle())?);
    let simulator = MeasurementSimulator::from_config(&config, memory.clone());
    let slave = CcpSlave::new(config, memory, transport, timebase)?;

    run(slave, simulator).await?;

    info!("CCP Slave Simulator stopped");
    Ok(())
}

fn load_config(path: &str) -> Result<SlaveConfig> {
    let yaml = matches!(
        Path::new(path).extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    let config = if yaml {
        SlaveConfig::load_yaml(path)
    } else {
        SlaveConfig::load(path)
    };
    config.with_context(|| format!("Failed to load config {}", path))
}

fn parse_hex(s: &str) -> Result<u32> {
    let s = s.trim();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(s, 16).map_err(|e| anyhow::anyhow!("Invalid hex value: {}", e))
}

async fn run(mut slave: CcpSlave, mut simulator: MeasurementSimulator) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));

    // Measurement update task
    let running_for_update = running.clone();
    let update_handle = tokio::spawn(async move {
        if simulator.is_empty() {
            return;
        }
        info!(measurements = simulator.len(), "Measurement simulation started");
        let mut interval = tokio::time::interval(UPDATE_INTERVAL);
        while running_for_update.load(Ordering::SeqCst) {
            interval.tick().await;
            simulator.update();
        }
    });

    // Command loop; DAQ lists transmit from timebase tasks
    let running_for_main = running.clone();
    let main_handle: JoinHandle<()> = tokio::task::spawn_blocking(move || {
        while running_for_main.load(Ordering::SeqCst) {
            match slave.poll() {
                Ok(true) => {}
                Ok(false) => std::thread::sleep(Duration::from_millis(1)),
                Err(e) => {
                    error!(error = %e, "CAN transport error");
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
        }
    });

    info!("CCP slave ready - waiting for master");
    info!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    running.store(false, Ordering::SeqCst);

    let _ = tokio::time::timeout(Duration::from_secs(2), update_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(2), main_handle).await;

    Ok(())
}
