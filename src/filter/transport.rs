//! Device Transport
//!
//! One request/response exchange with a TF1 filter: build the request frame,
//! write it, wait for the device to process it, read the reply and validate
//! it. No retries happen here; a failed exchange is reported to the caller.

use crate::bus::I2cBus;
use bytes::Bytes;
use std::time::Duration;
use tf1_shared::{codec, timing, CommandCode, DeviceAddress, FilterError};
use tracing::{debug, error, warn};

/// Timing of a single exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeTiming {
    /// Bound on the request write
    pub write_timeout: Duration,
    /// Wait between the write and the read while the device processes the request
    pub settle_delay: Duration,
    /// Bound on the reply read
    pub read_timeout: Duration,
}

impl Default for ExchangeTiming {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_millis(timing::WRITE_TIMEOUT_MS),
            settle_delay: Duration::from_millis(timing::SETTLE_DELAY_MS),
            read_timeout: Duration::from_millis(timing::READ_TIMEOUT_MS),
        }
    }
}

/// Addressing context of one physical filter; immutable after creation
#[derive(Debug, Clone)]
pub struct FilterDevice {
    bus_id: String,
    address: DeviceAddress,
    timing: ExchangeTiming,
}

impl FilterDevice {
    pub fn new(bus_id: impl Into<String>, address: DeviceAddress, timing: ExchangeTiming) -> Self {
        Self {
            bus_id: bus_id.into(),
            address,
            timing,
        }
    }

    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    /// Perform one exchange and return the reply payload.
    ///
    /// `capacity` is the largest payload the caller accepts; a longer reply
    /// fails with `ProtocolError::BufferTooSmall`.
    pub async fn send_command(
        &self,
        bus: &mut dyn I2cBus,
        code: CommandCode,
        params: &[u8],
        capacity: usize,
    ) -> Result<Bytes, FilterError> {
        let addr = self.address.get();
        let request = codec::encode_request(self.address, code.byte(), params).map_err(|e| {
            error!("Request for {:?} rejected: {}", code, e);
            FilterError::from(e)
        })?;

        debug!(
            "TX {:?} (0x{:02X}) to {} on {}: {:02X?}",
            code,
            code.byte(),
            self.address,
            self.bus_id,
            &request[..]
        );

        if let Err(e) = bus.write(addr, &request, self.timing.write_timeout).await {
            error!("Failed to send {:?} to {}: {}", code, self.address, e);
            return Err(e.into());
        }

        tokio::time::sleep(self.timing.settle_delay).await;

        let mut raw = vec![0u8; codec::reply_read_len(capacity)];
        if let Err(e) = bus.read(addr, &mut raw, self.timing.read_timeout).await {
            error!("Failed to read reply to {:?} from {}: {}", code, self.address, e);
            return Err(e.into());
        }

        debug!("RX {:?} from {}: {:02X?}", code, self.address, &raw[..]);

        codec::decode_response(self.address, code.byte(), &raw, capacity).map_err(|e| {
            warn!("Reply to {:?} from {} rejected: {}", code, self.address, e);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SimulatedBus;
    use tf1_shared::device::SimulatedFilter;
    use tf1_shared::ProtocolError;

    fn setup() -> (FilterDevice, SimulatedBus) {
        let addr = DeviceAddress::new(0x3F).unwrap();
        let bus = SimulatedBus::new().with_filter(SimulatedFilter::c_band(addr));
        (FilterDevice::new("sim", addr, ExchangeTiming::default()), bus)
    }

    #[tokio::test(start_paused = true)]
    async fn test_exchange_success() {
        let (device, mut bus) = setup();
        let payload = device
            .send_command(&mut bus, CommandCode::Temperature, &[], 1)
            .await
            .unwrap();
        assert_eq!(&payload[..], &[27]);

        let transfers = bus.transfers();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].frame, codec::encode_request(device.address(), 0x08, &[]).unwrap().to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_delay_between_write_and_read() {
        let (device, mut bus) = setup();
        let start = tokio::time::Instant::now();
        device
            .send_command(&mut bus, CommandCode::Temperature, &[], 1)
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(timing::SETTLE_DELAY_MS));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_is_transport_error() {
        let (device, mut bus) = setup();
        bus.fail_next_write();
        let result = device.send_command(&mut bus, CommandCode::Temperature, &[], 1).await;
        assert!(matches!(result, Err(FilterError::Transport(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_is_transport_error() {
        let (device, mut bus) = setup();
        bus.fail_next_read();
        let result = device.send_command(&mut bus, CommandCode::Temperature, &[], 1).await;
        assert!(matches!(result, Err(FilterError::Transport(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_device_is_transport_error() {
        let (_, mut bus) = setup();
        let device = FilterDevice::new("sim", DeviceAddress::new(0x10).unwrap(), ExchangeTiming::default());
        let result = device.send_command(&mut bus, CommandCode::Identify, &[], 29).await;
        assert!(matches!(result, Err(FilterError::Transport(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupted_reply_is_checksum_mismatch() {
        let (device, mut bus) = setup();
        bus.corrupt_next_reply();
        let result = device.send_command(&mut bus, CommandCode::Temperature, &[], 1).await;
        assert!(matches!(
            result,
            Err(FilterError::Protocol(ProtocolError::ChecksumMismatch { .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_larger_than_capacity() {
        let (device, mut bus) = setup();
        let result = device.send_command(&mut bus, CommandCode::Identify, &[], 4).await;
        assert!(matches!(
            result,
            Err(FilterError::Protocol(ProtocolError::BufferTooSmall { capacity: 4, .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_request_never_reaches_bus() {
        let (device, mut bus) = setup();
        let params = [0u8; 30];
        let result = device.send_command(&mut bus, CommandCode::ChannelModify, &params, 0).await;
        assert!(matches!(
            result,
            Err(FilterError::Protocol(ProtocolError::FrameTooLarge(33)))
        ));
        assert!(bus.transfers().is_empty());
    }
}
