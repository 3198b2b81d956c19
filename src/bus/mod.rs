//! Two-wire bus access
//!
//! This module handles:
//! - The `I2cBus` trait implemented by every bus backend
//! - The Linux i2c-dev backend for real hardware
//! - An in-process simulated bus for development and tests
//! - The bus lock that serialises every device exchange

#[cfg(target_os = "linux")]
pub mod linux;
pub mod sim;
pub mod traits;

#[cfg(target_os = "linux")]
pub use linux::LinuxI2cBus;
pub use sim::SimulatedBus;
pub use traits::I2cBus;

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Process-wide bus lock; holding the guard is the only way to reach the bus
#[derive(Clone)]
pub struct BusHandle {
    bus: Arc<Mutex<Box<dyn I2cBus>>>,
    name: Arc<str>,
}

/// Exclusive access to the bus for the duration of one operation
pub struct BusGuard<'a> {
    guard: MutexGuard<'a, Box<dyn I2cBus>>,
}

impl Deref for BusGuard<'_> {
    type Target = dyn I2cBus;

    fn deref(&self) -> &Self::Target {
        &**self.guard
    }
}

impl DerefMut for BusGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut **self.guard
    }
}

impl BusHandle {
    pub fn new(bus: impl I2cBus + 'static) -> Self {
        let name = Arc::from(bus.name());
        Self {
            bus: Arc::new(Mutex::new(Box::new(bus))),
            name,
        }
    }

    /// Name of the backend behind the lock
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquire the bus lock
    pub async fn lock(&self) -> BusGuard<'_> {
        BusGuard {
            guard: self.bus.lock().await,
        }
    }
}
