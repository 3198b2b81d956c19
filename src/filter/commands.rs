//! Domain Command API
//!
//! One typed operation per TF1 capability, each a single exchange with a
//! fixed command code and a fixed parameter/payload shape.

use super::transport::FilterDevice;
use crate::bus::I2cBus;
use bytes::Bytes;
use tf1_shared::codec::{decode_f32_be, encode_f32_be};
use tf1_shared::limits::IDENTITY_PAYLOAD_LEN;
use tf1_shared::{
    CommandCode, DeviceAddress, FilterError, Identity, MirrorPosition, PowerMode, ProtocolError,
};
use tracing::info;

impl FilterDevice {
    /// Read the identification record
    pub async fn get_identity(&self, bus: &mut dyn I2cBus) -> Result<Identity, FilterError> {
        let payload = self
            .send_command(bus, CommandCode::Identify, &[], IDENTITY_PAYLOAD_LEN)
            .await?;
        Ok(Identity::from_payload(&payload))
    }

    /// Reset the device
    pub async fn reset(&self, bus: &mut dyn I2cBus) -> Result<(), FilterError> {
        self.send_command(bus, CommandCode::Reset, &[], 0).await?;
        Ok(())
    }

    /// Query the power mode, or set it when `mode` is given.
    ///
    /// Returns the mode echoed by the device, or `None` when it sent no byte.
    pub async fn get_or_set_power_mode(
        &self,
        bus: &mut dyn I2cBus,
        mode: Option<PowerMode>,
    ) -> Result<Option<PowerMode>, FilterError> {
        let params: Vec<u8> = mode.map(PowerMode::byte).into_iter().collect();
        let payload = self.send_command(bus, CommandCode::Power, &params, 1).await?;

        match payload.first() {
            None => Ok(None),
            Some(&byte) => PowerMode::try_from(byte).map(Some).map_err(|_| {
                FilterError::from(ProtocolError::MalformedPayload {
                    code: CommandCode::Power.byte(),
                    len: payload.len(),
                })
            }),
        }
    }

    /// Microcontroller temperature in degrees Celsius
    pub async fn get_temperature(&self, bus: &mut dyn I2cBus) -> Result<i8, FilterError> {
        let payload = self.send_command(bus, CommandCode::Temperature, &[], 1).await?;
        let [byte] = fixed::<1>(CommandCode::Temperature, &payload)?;
        Ok(byte as i8)
    }

    pub async fn set_mirror_position(
        &self,
        bus: &mut dyn I2cBus,
        position: MirrorPosition,
    ) -> Result<(), FilterError> {
        self.send_command(bus, CommandCode::SetMirror, &position.to_bytes(), 0)
            .await?;
        Ok(())
    }

    pub async fn get_mirror_position(
        &self,
        bus: &mut dyn I2cBus,
    ) -> Result<MirrorPosition, FilterError> {
        let payload = self
            .send_command(bus, CommandCode::MirrorPosition, &[], MirrorPosition::ENCODED_LEN)
            .await?;
        let raw = fixed::<{ MirrorPosition::ENCODED_LEN }>(CommandCode::MirrorPosition, &payload)?;
        Ok(MirrorPosition::from_bytes(&raw))
    }

    /// Query the output wavelength in nm, or set it when `value` is given.
    ///
    /// The device answers a set with the wavelength it settled on; a reply
    /// without payload yields `None`.
    pub async fn get_or_set_wavelength(
        &self,
        bus: &mut dyn I2cBus,
        value: Option<f32>,
    ) -> Result<Option<f32>, FilterError> {
        let encoded = value.map(encode_f32_be);
        let params: &[u8] = match &encoded {
            Some(raw) => raw,
            None => &[],
        };
        let payload = self.send_command(bus, CommandCode::Wavelength, params, 4).await?;

        if payload.is_empty() {
            return Ok(None);
        }
        fixed::<4>(CommandCode::Wavelength, &payload).map(|raw| Some(decode_f32_be(raw)))
    }

    /// Read the current wavelength, failing if the device sent no value
    pub async fn get_wavelength(&self, bus: &mut dyn I2cBus) -> Result<f32, FilterError> {
        self.get_or_set_wavelength(bus, None).await?.ok_or_else(|| {
            ProtocolError::MalformedPayload {
                code: CommandCode::Wavelength.byte(),
                len: 0,
            }
            .into()
        })
    }

    pub async fn get_min_wavelength(&self, bus: &mut dyn I2cBus) -> Result<f32, FilterError> {
        self.read_float(bus, CommandCode::WavelengthMin).await
    }

    pub async fn get_max_wavelength(&self, bus: &mut dyn I2cBus) -> Result<f32, FilterError> {
        self.read_float(bus, CommandCode::WavelengthMax).await
    }

    /// Ask the device to move to `new_address`.
    ///
    /// Success only confirms the frame was accepted; whether the device
    /// actually answers on the new address is not verified here.
    pub async fn set_i2c_address(
        &self,
        bus: &mut dyn I2cBus,
        new_address: DeviceAddress,
    ) -> Result<(), FilterError> {
        self.send_command(bus, CommandCode::I2cAddress, &[new_address.get()], 1)
            .await?;
        info!("Filter {} accepted new address {}", self.address(), new_address);
        Ok(())
    }

    async fn read_float(&self, bus: &mut dyn I2cBus, code: CommandCode) -> Result<f32, FilterError> {
        let payload = self.send_command(bus, code, &[], 4).await?;
        fixed::<4>(code, &payload).map(decode_f32_be)
    }
}

/// Require a payload of exactly `N` bytes
fn fixed<const N: usize>(code: CommandCode, payload: &Bytes) -> Result<[u8; N], FilterError> {
    <[u8; N]>::try_from(payload.as_ref()).map_err(|_| {
        ProtocolError::MalformedPayload {
            code: code.byte(),
            len: payload.len(),
        }
        .into()
    })
}
