//! Simulated bus hosting in-memory TF1 filters

use crate::bus::traits::{BusError, I2cBus};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tf1_shared::device::SimulatedFilter;

/// One frame written to the simulated bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusTransfer {
    pub address: u8,
    pub frame: Vec<u8>,
}

impl BusTransfer {
    /// Command code of the written frame
    pub fn code(&self) -> Option<u8> {
        self.frame.first().copied()
    }

    /// Parameter block of the written frame
    pub fn params(&self) -> &[u8] {
        if self.frame.len() < 3 {
            return &[];
        }
        &self.frame[2..self.frame.len() - 1]
    }
}

/// Frames kept in the transfer log; older ones are dropped first
pub const TRANSFER_LOG_LEN: usize = 1024;

#[derive(Default)]
struct Faults {
    fail_next_write: bool,
    fail_next_read: bool,
    corrupt_next_reply: bool,
}

struct SimulatedBusInner {
    devices: HashMap<u8, SimulatedFilter>,
    pending: HashMap<u8, Bytes>,
    transfers: VecDeque<BusTransfer>,
    faults: Faults,
}

/// In-process bus; clones share the same devices and transfer log
#[derive(Clone)]
pub struct SimulatedBus {
    inner: Arc<Mutex<SimulatedBusInner>>,
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBus {
    /// Create an empty bus
    pub fn new() -> Self {
        SimulatedBus {
            inner: Arc::new(Mutex::new(SimulatedBusInner {
                devices: HashMap::new(),
                pending: HashMap::new(),
                transfers: VecDeque::with_capacity(TRANSFER_LOG_LEN),
                faults: Faults::default(),
            })),
        }
    }

    /// Attach a filter at its own address
    pub fn attach(&self, filter: SimulatedFilter) {
        let address = filter.address().get();
        self.lock().devices.insert(address, filter);
    }

    pub fn with_filter(self, filter: SimulatedFilter) -> Self {
        self.attach(filter);
        self
    }

    /// Snapshot of the filter answering at `address`
    pub fn filter(&self, address: u8) -> Option<SimulatedFilter> {
        self.lock().devices.get(&address).cloned()
    }

    /// Mutate the filter answering at `address`
    pub fn update_filter<F: FnOnce(&mut SimulatedFilter)>(&self, address: u8, f: F) {
        if let Some(filter) = self.lock().devices.get_mut(&address) {
            f(filter);
        }
    }

    /// The most recent frames written, oldest first
    pub fn transfers(&self) -> Vec<BusTransfer> {
        self.lock().transfers.iter().cloned().collect()
    }

    /// Frames written to `address` carrying command `code`
    #[cfg(test)]
    pub fn count_command(&self, address: u8, code: u8) -> usize {
        self.lock()
            .transfers
            .iter()
            .filter(|t| t.address == address && t.code() == Some(code))
            .count()
    }

    #[cfg(test)]
    pub fn clear_transfers(&self) {
        self.lock().transfers.clear();
    }

    /// Make the next write fail with a timeout
    pub fn fail_next_write(&self) {
        self.lock().faults.fail_next_write = true;
    }

    /// Make the next read fail with a timeout
    pub fn fail_next_read(&self) {
        self.lock().faults.fail_next_read = true;
    }

    /// Flip a bit in the checksum of the next reply
    pub fn corrupt_next_reply(&self) {
        self.lock().faults.corrupt_next_reply = true;
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedBusInner> {
        // A panicking test thread must not wedge the bus for the rest of the suite
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl I2cBus for SimulatedBus {
    async fn write(&mut self, address: u8, bytes: &[u8], timeout: Duration) -> Result<(), BusError> {
        let mut inner = self.lock();
        if std::mem::take(&mut inner.faults.fail_next_write) {
            return Err(BusError::Timeout(timeout));
        }

        if inner.transfers.len() == TRANSFER_LOG_LEN {
            inner.transfers.pop_front();
        }
        inner.transfers.push_back(BusTransfer {
            address,
            frame: bytes.to_vec(),
        });

        let mut filter = inner
            .devices
            .remove(&address)
            .ok_or(BusError::NoDevice(address))?;
        let response = filter.handle_request(bytes);

        // The filter may have been re-addressed by this request
        inner.devices.insert(filter.address().get(), filter);
        inner.pending.insert(address, response);
        Ok(())
    }

    async fn read(&mut self, address: u8, buf: &mut [u8], timeout: Duration) -> Result<(), BusError> {
        let mut inner = self.lock();
        if std::mem::take(&mut inner.faults.fail_next_read) {
            return Err(BusError::Timeout(timeout));
        }

        let response = match inner.pending.remove(&address) {
            Some(response) => response,
            None if inner.devices.contains_key(&address) => Bytes::new(),
            None => return Err(BusError::NoDevice(address)),
        };

        let mut response = response.to_vec();
        if std::mem::take(&mut inner.faults.corrupt_next_reply) {
            if let Some(last) = response.last_mut() {
                *last ^= 0x01;
            }
        }

        // Bytes past the end of the reply read back as an idle bus
        buf.fill(0xFF);
        let n = response.len().min(buf.len());
        buf[..n].copy_from_slice(&response[..n]);
        Ok(())
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tf1_shared::{codec, DeviceAddress};

    const TIMEOUT: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn test_unknown_address_nacks() {
        let mut bus = SimulatedBus::new();
        let result = bus.write(0x10, &[0x01, 0x00, 0x00], TIMEOUT).await;
        assert!(matches!(result, Err(BusError::NoDevice(0x10))));
    }

    #[tokio::test]
    async fn test_request_reply_roundtrip() {
        let addr = DeviceAddress::new(0x3F).unwrap();
        let mut bus = SimulatedBus::new().with_filter(SimulatedFilter::c_band(addr));

        let request = codec::encode_request(addr, 0x08, &[]).unwrap();
        bus.write(0x3F, &request, TIMEOUT).await.unwrap();

        let mut buf = [0u8; 6];
        bus.read(0x3F, &mut buf, TIMEOUT).await.unwrap();
        let payload = codec::decode_response(addr, 0x08, &buf, 1).unwrap();
        assert_eq!(payload[0], 27);
        assert_eq!(&buf[4..], &[0xFF, 0xFF]);

        assert_eq!(bus.count_command(0x3F, 0x08), 1);
        assert!(bus.transfers()[0].params().is_empty());
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let addr = DeviceAddress::new(0x3F).unwrap();
        let mut bus = SimulatedBus::new().with_filter(SimulatedFilter::c_band(addr));

        bus.fail_next_write();
        assert!(bus.write(0x3F, &[0x08, 0x00, 0x00], TIMEOUT).await.is_err());
        assert!(bus.write(0x3F, &[0x08, 0x00, 0x00], TIMEOUT).await.is_ok());

        bus.fail_next_read();
        let mut buf = [0u8; 4];
        assert!(bus.read(0x3F, &mut buf, TIMEOUT).await.is_err());
    }

    #[tokio::test]
    async fn test_transfer_log_is_bounded() {
        let mut bus = SimulatedBus::new();
        for i in 0..TRANSFER_LOG_LEN as u32 + 10 {
            let mut frame = vec![0x55, 4];
            frame.extend_from_slice(&i.to_be_bytes());
            frame.push(0x00);
            let _ = bus.write(0x10, &frame, TIMEOUT).await;
        }

        let transfers = bus.transfers();
        assert_eq!(transfers.len(), TRANSFER_LOG_LEN);
        assert_eq!(transfers[0].params(), &10u32.to_be_bytes());
        assert_eq!(
            transfers[TRANSFER_LOG_LEN - 1].params(),
            &(TRANSFER_LOG_LEN as u32 + 9).to_be_bytes()
        );
    }
}
