//! Channel Registry
//!
//! The fixed set of named channels, one per physical filter, created once
//! at startup. Each channel owns the slot of its sweep task.

use super::sweep::{SweepParams, SweepStatus, SweepTask};
use crate::bus::BusHandle;
use crate::filter::FilterDevice;
use std::sync::Arc;
use std::time::Duration;
use tf1_shared::{FilterError, PowerMode};
use tokio::sync::Mutex;
use tracing::info;

/// One filter plus its background-task state
pub struct Channel {
    name: char,
    device: FilterDevice,
    power_on_settle: Duration,
    sweep: Mutex<Option<SweepTask>>,
}

impl Channel {
    pub fn new(name: char, device: FilterDevice, power_on_settle: Duration) -> Self {
        Self {
            name: name.to_ascii_uppercase(),
            device,
            power_on_settle,
            sweep: Mutex::new(None),
        }
    }

    pub fn name(&self) -> char {
        self.name
    }

    pub fn device(&self) -> &FilterDevice {
        &self.device
    }

    /// Switch the filter to normal power if it is not already there.
    ///
    /// Each exchange takes the bus lock on its own; the lock is released
    /// before the stabilisation wait.
    pub async fn ensure_power_on(&self, bus: &BusHandle) -> Result<(), FilterError> {
        let mode = {
            let mut guard = bus.lock().await;
            self.device.get_or_set_power_mode(&mut *guard, None).await?
        };

        if mode != Some(PowerMode::Normal) {
            {
                let mut guard = bus.lock().await;
                self.device
                    .get_or_set_power_mode(&mut *guard, Some(PowerMode::Normal))
                    .await?;
            }
            info!("Channel {} switched to normal power", self.name);
            tokio::time::sleep(self.power_on_settle).await;
        }
        Ok(())
    }

    /// Start a sweep, replacing any sweep already running on this channel.
    ///
    /// Invalid parameters are rejected before anything else happens. The
    /// previous task has fully exited before the new one is spawned.
    pub async fn start_sweep(&self, bus: &BusHandle, params: SweepParams) -> Result<(), FilterError> {
        params.validate()?;

        let mut slot = self.sweep.lock().await;
        if let Some(previous) = slot.take() {
            info!("[SWEEP] Replacing sweep on channel {}", self.name);
            previous.cancel().await;
        }
        *slot = Some(SweepTask::spawn(
            self.name,
            self.device.clone(),
            bus.clone(),
            params,
        ));
        Ok(())
    }

    /// Cancel the running sweep; returns whether one was running.
    ///
    /// Must not be called while holding the bus lock: the task may be in the
    /// middle of an exchange and is awaited until it exits.
    pub async fn stop_sweep(&self) -> bool {
        let task = self.sweep.lock().await.take();
        match task {
            Some(task) => {
                task.cancel().await;
                true
            }
            None => false,
        }
    }

    pub async fn sweep_status(&self) -> Option<SweepStatus> {
        self.sweep.lock().await.as_ref().map(SweepTask::status)
    }
}

/// Fixed table of channels, looked up by band character
pub struct ChannelRegistry {
    channels: Vec<Arc<Channel>>,
}

impl ChannelRegistry {
    /// Build the registry; names must be unique ignoring case
    pub fn new(channels: Vec<Channel>) -> Result<Self, FilterError> {
        for (i, channel) in channels.iter().enumerate() {
            if channels[..i].iter().any(|c| c.name == channel.name) {
                return Err(FilterError::argument(format!(
                    "duplicate channel name {}",
                    channel.name
                )));
            }
        }
        Ok(Self {
            channels: channels.into_iter().map(Arc::new).collect(),
        })
    }

    /// Resolve a band selector: exactly one character, case-insensitive
    pub fn select(&self, band: &str) -> Result<&Arc<Channel>, FilterError> {
        let mut chars = band.trim().chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return Err(FilterError::argument(format!("invalid band selector '{band}'")));
        };

        let c = c.to_ascii_uppercase();
        self.channels
            .iter()
            .find(|channel| channel.name == c)
            .ok_or_else(|| FilterError::argument(format!("unknown band '{band}'")))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Channel>> {
        self.channels.iter()
    }

    /// Cancel every running sweep
    pub async fn stop_all_sweeps(&self) {
        futures::future::join_all(self.channels.iter().map(|c| c.stop_sweep())).await;
    }
}
