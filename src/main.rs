mod bus;
mod channel;
mod command;
mod config;
mod context;
mod filter;
mod operator;
mod transport;

use anyhow::Result;
use bus::BusHandle;
use clap::Parser;
use command::CommandDispatcher;
use config::{AppConfig, BusKind, OperatorKind};
use context::AppContext;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use transport::{SerialConnector, StdioConnector};

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Controller for TF1 tunable optical filters on a shared I2C bus
#[derive(Parser, Debug)]
#[command(name = "tf1-controller", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Run against simulated filters instead of real hardware
    #[arg(long)]
    simulate: bool,

    /// i2c-dev node of the filter bus
    #[arg(long, value_name = "DEVICE")]
    bus: Option<String>,

    /// Take operator commands from this serial port instead of stdio
    #[arg(long, value_name = "PORT")]
    serial: Option<String>,

    /// Baud rate of the operator serial port
    #[arg(long)]
    baud: Option<u32>,
}

impl Cli {
    /// Command-line flags take precedence over the file
    fn apply(&self, config: &mut AppConfig) {
        if self.simulate {
            config.bus.kind = BusKind::Simulated;
        }
        if let Some(device) = &self.bus {
            config.bus.device = device.clone();
        }
        if let Some(port) = &self.serial {
            config.operator.kind = OperatorKind::Serial;
            config.operator.port = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            config.operator.baud = baud;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    cli.apply(&mut config);

    // Logs go to stderr; stdout may be the operator channel
    let default_level = config.log_level.as_deref().unwrap_or("info");
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    config.validate()?;

    let bus = open_bus(&config)?;
    let bus_id = bus.name().to_string();
    info!("TF1 controller starting on bus {}", bus_id);

    let ctx = Arc::new(AppContext::from_config(&config, bus, &bus_id)?);
    let dispatcher = CommandDispatcher::new(ctx.clone());
    let token = CancellationToken::new();

    let mut operator_task = tokio::spawn({
        let token = token.clone();
        let operator_config = config.operator.clone();
        async move {
            match operator_config.kind {
                OperatorKind::Stdio => {
                    operator::run_operator(&StdioConnector, dispatcher, token).await
                }
                OperatorKind::Serial => {
                    let port = operator_config.port.unwrap_or_default();
                    let connector = SerialConnector::new(port, operator_config.baud);
                    operator::run_operator(&connector, dispatcher, token).await
                }
            }
        }
    });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutdown requested");
        }
        result = &mut operator_task => {
            match result {
                Ok(Ok(())) => info!("Operator channel closed"),
                Ok(Err(e)) => error!("Operator channel failed: {}", e),
                Err(e) => error!("Operator task panicked: {}", e),
            }
        }
    }

    token.cancel();
    ctx.channels.stop_all_sweeps().await;
    if !operator_task.is_finished() {
        if let Err(e) = operator_task.await {
            warn!("Operator task ended abnormally: {}", e);
        }
    }

    info!("TF1 controller stopped");
    Ok(())
}

fn open_bus(config: &AppConfig) -> Result<BusHandle> {
    match config.bus.kind {
        BusKind::Simulated => Ok(BusHandle::new(context::simulated_bus(config)?)),
        BusKind::Linux => open_linux_bus(&config.bus.device),
    }
}

#[cfg(target_os = "linux")]
fn open_linux_bus(device: &str) -> Result<BusHandle> {
    Ok(BusHandle::new(bus::LinuxI2cBus::open(device)?))
}

#[cfg(not(target_os = "linux"))]
fn open_linux_bus(device: &str) -> Result<BusHandle> {
    anyhow::bail!("{} needs Linux i2c-dev support; run with --simulate", device)
}
