//! Application context shared by every task

use crate::bus::{BusHandle, SimulatedBus};
use crate::channel::{Channel, ChannelRegistry};
use crate::config::AppConfig;
use crate::filter::FilterDevice;
use anyhow::Result;
use tf1_shared::device::SimulatedFilter;
use tf1_shared::DeviceAddress;
use tracing::info;

/// Everything a handler or background task needs: the bus lock and the
/// channel registry
pub struct AppContext {
    pub bus: BusHandle,
    pub channels: ChannelRegistry,
}

impl AppContext {
    pub fn new(bus: BusHandle, channels: ChannelRegistry) -> Self {
        Self { bus, channels }
    }

    /// Build the channel registry for `bus` from the configured channels
    pub fn from_config(config: &AppConfig, bus: BusHandle, bus_id: &str) -> Result<Self> {
        let mut channels = Vec::new();
        for channel in config.channels() {
            let address = DeviceAddress::new(channel.address)?;
            info!("Channel {} -> filter at {} on {}", channel.name, address, bus_id);
            channels.push(Channel::new(
                channel.name,
                FilterDevice::new(bus_id, address, config.timing.exchange()),
                config.timing.power_on_settle(),
            ));
        }
        Ok(Self::new(bus, ChannelRegistry::new(channels)?))
    }
}

/// Simulated bus with one filter per configured channel.
///
/// Channels are assigned C-band and L-band models alternately, in order.
pub fn simulated_bus(config: &AppConfig) -> Result<SimulatedBus> {
    let bus = SimulatedBus::new();
    for (i, channel) in config.channels().iter().enumerate() {
        let address = DeviceAddress::new(channel.address)?;
        let filter = if i % 2 == 0 {
            SimulatedFilter::c_band(address)
        } else {
            SimulatedFilter::l_band(address)
        };
        bus.attach(filter);
    }
    Ok(bus)
}
