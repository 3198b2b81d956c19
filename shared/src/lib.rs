//! TF1 Shared Protocol Types
//!
//! This crate provides the wire protocol types and codec for talking to TF1
//! MEMS tunable optical filters over I2C, plus the line framing used by the
//! operator command channel.

pub mod codec;
pub mod device;
pub mod error;
pub mod operator;

use std::fmt;

pub use error::{FilterError, ProtocolError};

/// Factory default 7-bit address of a TF1 filter (0xFE as an 8-bit R/W address)
pub const DEFAULT_DEVICE_ADDRESS: u8 = 0x7F;

/// Timing parameters for device exchanges
pub mod timing {
    /// Bound on a single bus write, in milliseconds
    pub const WRITE_TIMEOUT_MS: u64 = 200;

    /// Processing time the device needs before its reply can be read
    pub const SETTLE_DELAY_MS: u64 = 150;

    /// Bound on a single bus read, in milliseconds
    pub const READ_TIMEOUT_MS: u64 = 200;

    /// Stabilisation wait after switching a filter from low power to normal
    pub const POWER_ON_SETTLE_MS: u64 = 100;

    /// Back-off applied by the line reader when its stream reports end of data
    pub const EOF_BACKOFF_MS: u64 = 10;
}

/// Size limits of the wire and operator protocols
pub mod limits {
    /// Largest frame (request or response) the device handles
    pub const MAX_FRAME_LEN: usize = 32;

    /// Command byte + length byte + checksum byte
    pub const FRAME_OVERHEAD: usize = 3;

    /// Largest operator command line (without the leading ':' and terminator)
    pub const MAX_LINE_LEN: usize = 127;

    /// Reply capacity reserved for the identity string
    pub const IDENTITY_PAYLOAD_LEN: usize = 29;

    pub const MODEL_LEN: usize = 15;
    pub const SERIAL_LEN: usize = 15;
    pub const FIRMWARE_LEN: usize = 7;
}

/// Command codes understood by the TF1 filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandCode {
    /// Identification string (model|serial|firmware)
    Identify = 0x01,
    /// Device reset
    Reset = 0x02,
    /// Get or set the power mode
    Power = 0x03,
    /// Get or set the error return mode
    ErrorMode = 0x04,
    /// Microcontroller temperature
    Temperature = 0x08,
    /// Get or set the UART baud rate
    UartBaud = 0x10,
    /// Get or set the UART parity
    UartParity = 0x11,
    /// Get or set the SMBus/I2C address
    I2cAddress = 0x20,
    /// Move the MEMS mirror
    SetMirror = 0x50,
    /// Current MEMS mirror position
    MirrorPosition = 0x51,
    /// Select a user-defined channel
    ChannelSet = 0x52,
    /// Read a user-defined channel
    ChannelGet = 0x53,
    /// Modify a user-defined channel
    ChannelModify = 0x54,
    /// Get or set the output wavelength
    Wavelength = 0x55,
    /// Minimum selectable wavelength
    WavelengthMin = 0x56,
    /// Maximum selectable wavelength
    WavelengthMax = 0x57,
}

impl CommandCode {
    pub const ALL: [CommandCode; 16] = [
        CommandCode::Identify,
        CommandCode::Reset,
        CommandCode::Power,
        CommandCode::ErrorMode,
        CommandCode::Temperature,
        CommandCode::UartBaud,
        CommandCode::UartParity,
        CommandCode::I2cAddress,
        CommandCode::SetMirror,
        CommandCode::MirrorPosition,
        CommandCode::ChannelSet,
        CommandCode::ChannelGet,
        CommandCode::ChannelModify,
        CommandCode::Wavelength,
        CommandCode::WavelengthMin,
        CommandCode::WavelengthMax,
    ];

    /// Raw command byte
    pub fn byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for CommandCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        CommandCode::ALL
            .iter()
            .copied()
            .find(|code| code.byte() == value)
            .ok_or(value)
    }
}

/// 7-bit I2C address of a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress(u8);

impl DeviceAddress {
    /// Create an address, rejecting values outside 0..=127
    pub fn new(address: u8) -> Result<Self, FilterError> {
        if address > 0x7F {
            return Err(FilterError::Argument(format!(
                "I2C address 0x{address:02X} is not a 7-bit address"
            )));
        }
        Ok(Self(address))
    }

    /// The 7-bit address
    pub fn get(self) -> u8 {
        self.0
    }

    /// Address byte with the write direction bit, as seen on the wire
    pub fn write_byte(self) -> u8 {
        self.0 << 1
    }

    /// Address byte with the read direction bit, as seen on the wire
    pub fn read_byte(self) -> u8 {
        (self.0 << 1) | 0x01
    }
}

impl Default for DeviceAddress {
    fn default() -> Self {
        Self(DEFAULT_DEVICE_ADDRESS)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Filter power mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerMode {
    /// Low consumption idle mode
    Low = 0,
    /// Normal operating mode
    #[default]
    Normal = 1,
}

impl PowerMode {
    pub fn byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for PowerMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PowerMode::Low),
            1 => Ok(PowerMode::Normal),
            other => Err(other),
        }
    }
}

/// Identification record reported by a filter
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identity {
    pub model: String,
    pub serial_number: String,
    pub firmware: String,
}

impl Identity {
    /// Parse a `model|serial|firmware` reply payload.
    ///
    /// Empty fields are skipped, each field is cut to its bounded capacity and
    /// fields missing at the end keep their default (empty) value.
    pub fn from_payload(payload: &[u8]) -> Self {
        let text = String::from_utf8_lossy(payload);
        let text = text.split('\0').next().unwrap_or_default();
        let mut fields = text.split('|').filter(|field| !field.is_empty());

        let mut identity = Identity::default();
        if let Some(model) = fields.next() {
            identity.model = bounded(model, limits::MODEL_LEN);
        }
        if let Some(serial) = fields.next() {
            identity.serial_number = bounded(serial, limits::SERIAL_LEN);
        }
        if let Some(firmware) = fields.next() {
            identity.firmware = bounded(firmware, limits::FIRMWARE_LEN);
        }
        identity
    }
}

fn bounded(field: &str, capacity: usize) -> String {
    field.chars().take(capacity).collect()
}

/// Actuator values of the MEMS mirror, one pair per axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MirrorPosition {
    pub x_neg: u16,
    pub x_pos: u16,
    pub y_neg: u16,
    pub y_pos: u16,
}

impl MirrorPosition {
    pub const ENCODED_LEN: usize = 8;

    /// Big-endian wire layout: x_neg, x_pos, y_neg, y_pos
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[0..2].copy_from_slice(&self.x_neg.to_be_bytes());
        out[2..4].copy_from_slice(&self.x_pos.to_be_bytes());
        out[4..6].copy_from_slice(&self.y_neg.to_be_bytes());
        out[6..8].copy_from_slice(&self.y_pos.to_be_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; 8]) -> Self {
        Self {
            x_neg: u16::from_be_bytes([bytes[0], bytes[1]]),
            x_pos: u16::from_be_bytes([bytes[2], bytes[3]]),
            y_neg: u16::from_be_bytes([bytes[4], bytes[5]]),
            y_pos: u16::from_be_bytes([bytes[6], bytes[7]]),
        }
    }
}

impl fmt::Display for MirrorPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{},{},{})",
            self.x_neg, self.x_pos, self.y_neg, self.y_pos
        )
    }
}
