//! Controller configuration
//!
//! Loaded from an optional TOML file; every section has defaults matching
//! the two-filter deployment, and command-line flags override the file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tf1_shared::{timing, DeviceAddress};

use crate::filter::ExchangeTiming;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bus: BusConfig,
    pub channels: Vec<ChannelConfig>,
    pub timing: TimingConfig,
    pub operator: OperatorConfig,
    /// Default tracing directive when `RUST_LOG` is unset
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    /// Linux i2c-dev character device
    #[default]
    Linux,
    /// In-process filters, no hardware needed
    Simulated,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub kind: BusKind,
    /// i2c-dev node, e.g. `/dev/i2c-1`
    pub device: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            kind: BusKind::Linux,
            device: "/dev/i2c-1".into(),
        }
    }
}

/// One named channel and the 7-bit address of its filter
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelConfig {
    pub name: char,
    pub address: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub write_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub read_timeout_ms: u64,
    pub power_on_settle_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            write_timeout_ms: timing::WRITE_TIMEOUT_MS,
            settle_delay_ms: timing::SETTLE_DELAY_MS,
            read_timeout_ms: timing::READ_TIMEOUT_MS,
            power_on_settle_ms: timing::POWER_ON_SETTLE_MS,
        }
    }
}

impl TimingConfig {
    pub fn exchange(&self) -> ExchangeTiming {
        ExchangeTiming {
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
        }
    }

    pub fn power_on_settle(&self) -> Duration {
        Duration::from_millis(self.power_on_settle_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorKind {
    /// Commands on stdin, replies on stdout
    #[default]
    Stdio,
    /// Commands and replies on a serial port
    Serial,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    pub kind: OperatorKind,
    /// Serial port path, used when `kind = "serial"`
    pub port: Option<String>,
    pub baud: u32,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            kind: OperatorKind::Stdio,
            port: None,
            baud: 115_200,
        }
    }
}

/// Channels of the standard deployment: C band at 0x3F, L band at 0x7F
pub fn default_channels() -> Vec<ChannelConfig> {
    vec![
        ChannelConfig {
            name: 'C',
            address: 0x3F,
        },
        ChannelConfig {
            name: 'L',
            address: 0x7F,
        },
    ]
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Configured channels, or the standard pair when none are listed
    pub fn channels(&self) -> Vec<ChannelConfig> {
        if self.channels.is_empty() {
            default_channels()
        } else {
            self.channels.clone()
        }
    }

    /// Reject configurations the controller cannot run with
    pub fn validate(&self) -> Result<()> {
        let channels = self.channels();
        for (i, channel) in channels.iter().enumerate() {
            if !channel.name.is_ascii_alphabetic() {
                bail!("Channel name '{}' must be a single ASCII letter", channel.name);
            }
            DeviceAddress::new(channel.address)
                .with_context(|| format!("Channel {} address", channel.name))?;

            for other in &channels[..i] {
                if other.name.eq_ignore_ascii_case(&channel.name) {
                    bail!("Duplicate channel name '{}'", channel.name);
                }
                if other.address == channel.address {
                    bail!(
                        "Channels {} and {} share address 0x{:02X}",
                        other.name,
                        channel.name,
                        channel.address
                    );
                }
            }
        }

        if self.timing.write_timeout_ms == 0 || self.timing.read_timeout_ms == 0 {
            bail!("Bus timeouts must be non-zero");
        }
        if self.operator.kind == OperatorKind::Serial && self.operator.port.is_none() {
            bail!("Serial operator channel needs a port");
        }
        if self.operator.baud == 0 {
            bail!("Operator baud rate must be non-zero");
        }
        Ok(())
    }
}
