//! Bus trait abstraction for pluggable I2C backends

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tf1_shared::FilterError;

/// Failures reported by a bus backend
#[derive(Error, Debug)]
pub enum BusError {
    #[error("Bus transfer timed out after {0:?}")]
    Timeout(Duration),

    #[error("No device acknowledged address 0x{0:02X}")]
    NoDevice(u8),

    #[error("Bus I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BusError> for FilterError {
    fn from(err: BusError) -> Self {
        FilterError::Transport(err.to_string())
    }
}

/// A master on a shared two-wire bus
#[async_trait]
pub trait I2cBus: Send {
    /// Write `bytes` to the device at the 7-bit `address`
    async fn write(&mut self, address: u8, bytes: &[u8], timeout: Duration) -> Result<(), BusError>;

    /// Fill `buf` with bytes read from the device at the 7-bit `address`
    async fn read(&mut self, address: u8, buf: &mut [u8], timeout: Duration) -> Result<(), BusError>;

    /// Human-readable name for this bus
    fn name(&self) -> &str;
}
