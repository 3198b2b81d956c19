//! Device-side model of a TF1 filter
//!
//! Answers request frames the way the hardware does, so the controller can
//! run and be tested without a bus attached.

use bytes::Bytes;

use crate::codec::{self, decode_f32_be, encode_f32_be};
use crate::limits::FRAME_OVERHEAD;
use crate::{CommandCode, DeviceAddress, Identity, MirrorPosition, PowerMode};

/// Error codes the simulated device reports through the error echo
pub mod device_error {
    /// Request checksum did not match
    pub const CHECKSUM: u8 = 0x01;
    /// Command code not supported
    pub const UNKNOWN_COMMAND: u8 = 0x02;
    /// Parameter block has the wrong length
    pub const BAD_LENGTH: u8 = 0x03;
    /// Parameter value outside the accepted range
    pub const OUT_OF_RANGE: u8 = 0x04;
}

/// In-memory TF1 filter
#[derive(Debug, Clone)]
pub struct SimulatedFilter {
    address: DeviceAddress,
    identity: Identity,
    power: PowerMode,
    wavelength: f32,
    min_wavelength: f32,
    max_wavelength: f32,
    temperature: i8,
    mirror: MirrorPosition,
    pending_address: Option<DeviceAddress>,
}

impl SimulatedFilter {
    pub fn new(
        address: DeviceAddress,
        identity: Identity,
        min_wavelength: f32,
        max_wavelength: f32,
    ) -> Self {
        Self {
            address,
            identity,
            power: PowerMode::Low,
            wavelength: min_wavelength,
            min_wavelength,
            max_wavelength,
            temperature: 27,
            mirror: MirrorPosition::default(),
            pending_address: None,
        }
    }

    /// C-band filter (1527.608 nm - 1565.503 nm)
    pub fn c_band(address: DeviceAddress) -> Self {
        Self::new(
            address,
            Identity {
                model: "TF1-C".into(),
                serial_number: "SIM-C-0001".into(),
                firmware: "1.2".into(),
            },
            1527.608,
            1565.503,
        )
    }

    /// L-band filter (1570 nm - 1605 nm)
    pub fn l_band(address: DeviceAddress) -> Self {
        Self::new(
            address,
            Identity {
                model: "TF1-L".into(),
                serial_number: "SIM-L-0001".into(),
                firmware: "1.2".into(),
            },
            1570.0,
            1605.0,
        )
    }

    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    pub fn wavelength(&self) -> f32 {
        self.wavelength
    }

    pub fn power_mode(&self) -> PowerMode {
        self.power
    }

    pub fn set_power_mode(&mut self, mode: PowerMode) {
        self.power = mode;
    }

    pub fn set_temperature(&mut self, celsius: i8) {
        self.temperature = celsius;
    }

    pub fn mirror(&self) -> MirrorPosition {
        self.mirror
    }

    /// Process one request frame and produce the response frame
    pub fn handle_request(&mut self, frame: &[u8]) -> Bytes {
        let code = frame.first().copied().unwrap_or(0);

        if frame.len() < FRAME_OVERHEAD || frame.len() != FRAME_OVERHEAD + frame[1] as usize {
            return self.error(code, device_error::BAD_LENGTH);
        }

        let (body, crc) = frame.split_at(frame.len() - 1);
        if codec::frame_checksum(self.address.write_byte(), body) != crc[0] {
            return self.error(code, device_error::CHECKSUM);
        }

        let params = &body[2..];
        let Ok(command) = CommandCode::try_from(code) else {
            return self.error(code, device_error::UNKNOWN_COMMAND);
        };

        let response = match self.execute(command, params) {
            Ok(payload) => self.reply(code, &payload),
            Err(error_code) => self.error(code, error_code),
        };

        // A new address takes effect once the acknowledgement has been sent
        if let Some(address) = self.pending_address.take() {
            self.address = address;
        }
        response
    }

    fn execute(&mut self, command: CommandCode, params: &[u8]) -> Result<Vec<u8>, u8> {
        match (command, params.len()) {
            (CommandCode::Identify, 0) => Ok(format!(
                "{}|{}|{}|",
                self.identity.model, self.identity.serial_number, self.identity.firmware
            )
            .into_bytes()),
            (CommandCode::Reset, 0) => {
                self.power = PowerMode::Low;
                self.wavelength = self.min_wavelength;
                self.mirror = MirrorPosition::default();
                Ok(Vec::new())
            }
            (CommandCode::Power, 0) => Ok(vec![self.power.byte()]),
            (CommandCode::Power, 1) => {
                self.power = PowerMode::try_from(params[0]).map_err(|_| device_error::OUT_OF_RANGE)?;
                Ok(vec![self.power.byte()])
            }
            (CommandCode::Temperature, 0) => Ok(vec![self.temperature as u8]),
            (CommandCode::I2cAddress, 0) => Ok(vec![self.address.get()]),
            (CommandCode::I2cAddress, 1) => {
                let address =
                    DeviceAddress::new(params[0]).map_err(|_| device_error::OUT_OF_RANGE)?;
                self.pending_address = Some(address);
                Ok(Vec::new())
            }
            (CommandCode::SetMirror, MirrorPosition::ENCODED_LEN) => {
                let mut raw = [0u8; MirrorPosition::ENCODED_LEN];
                raw.copy_from_slice(params);
                self.mirror = MirrorPosition::from_bytes(&raw);
                Ok(Vec::new())
            }
            (CommandCode::MirrorPosition, 0) => Ok(self.mirror.to_bytes().to_vec()),
            (CommandCode::Wavelength, 0) => Ok(encode_f32_be(self.wavelength).to_vec()),
            (CommandCode::Wavelength, 4) => {
                let requested = decode_f32_be([params[0], params[1], params[2], params[3]]);
                if !(self.min_wavelength..=self.max_wavelength).contains(&requested) {
                    return Err(device_error::OUT_OF_RANGE);
                }
                self.wavelength = requested;
                Ok(encode_f32_be(self.wavelength).to_vec())
            }
            (CommandCode::WavelengthMin, 0) => Ok(encode_f32_be(self.min_wavelength).to_vec()),
            (CommandCode::WavelengthMax, 0) => Ok(encode_f32_be(self.max_wavelength).to_vec()),
            (
                CommandCode::ErrorMode
                | CommandCode::UartBaud
                | CommandCode::UartParity
                | CommandCode::ChannelSet
                | CommandCode::ChannelGet
                | CommandCode::ChannelModify,
                _,
            ) => Err(device_error::UNKNOWN_COMMAND),
            _ => Err(device_error::BAD_LENGTH),
        }
    }

    fn reply(&self, code: u8, payload: &[u8]) -> Bytes {
        // Every modelled payload fits a frame
        codec::encode_response(self.address, code, payload)
            .unwrap_or_else(|_| codec::encode_error_response(self.address, code, device_error::BAD_LENGTH))
    }

    fn error(&self, code: u8, error_code: u8) -> Bytes {
        codec::encode_error_response(self.address, code, error_code)
    }
}
