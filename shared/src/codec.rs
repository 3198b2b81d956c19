//! Frame codec for the TF1 I2C protocol
//!
//! Requests and responses are framed as:
//! ```text
//! request:  [ code ][ len ][ params (len bytes) ][ crc ]
//! response: [ echo ][ len | error code ][ payload (len bytes) ][ crc ]
//! ```
//!
//! The checksum is CRC-8 (polynomial 0x07, initial value 0) computed over the
//! address byte of the transfer direction followed by every frame byte before
//! the checksum. The address byte itself is never transmitted as part of the
//! frame. A device reports a failure by setting the top bit of the echo and
//! sending a single error code byte instead of a payload.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FilterError, ProtocolError};
use crate::limits::{FRAME_OVERHEAD, MAX_FRAME_LEN};
use crate::DeviceAddress;

/// Bit set on the echoed command code when the device reports an error
pub const ERROR_FLAG: u8 = 0x80;

const CRC8_POLY: u8 = 0x07;

const CRC8_TABLE: [u8; 256] = build_crc8_table();

const fn build_crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC8_POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// CRC-8 over a byte sequence
pub fn checksum(bytes: &[u8]) -> u8 {
    checksum_update(0, bytes)
}

fn checksum_update(crc: u8, bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(crc, |crc, &byte| CRC8_TABLE[(crc ^ byte) as usize])
}

/// CRC-8 over the synthetic address byte followed by the frame bytes
pub fn frame_checksum(address_byte: u8, frame: &[u8]) -> u8 {
    checksum_update(checksum(&[address_byte]), frame)
}

/// Big-endian IEEE-754 single precision encoding
pub fn encode_f32_be(value: f32) -> [u8; 4] {
    value.to_bits().to_be_bytes()
}

/// Big-endian IEEE-754 single precision decoding
pub fn decode_f32_be(bytes: [u8; 4]) -> f32 {
    f32::from_bits(u32::from_be_bytes(bytes))
}

/// Build a request frame for `code` with the given parameter block
pub fn encode_request(
    address: DeviceAddress,
    code: u8,
    params: &[u8],
) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::with_capacity(FRAME_OVERHEAD + params.len());
    encode_request_into(address, code, params, &mut buf)?;
    Ok(buf.freeze())
}

/// Append a request frame to a provided buffer
pub fn encode_request_into(
    address: DeviceAddress,
    code: u8,
    params: &[u8],
    buf: &mut BytesMut,
) -> Result<(), ProtocolError> {
    let frame_len = FRAME_OVERHEAD + params.len();
    if frame_len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(frame_len));
    }

    let start = buf.len();
    buf.reserve(frame_len);
    buf.put_u8(code);
    buf.put_u8(params.len() as u8);
    buf.put_slice(params);

    let crc = frame_checksum(address.write_byte(), &buf[start..]);
    buf.put_u8(crc);

    Ok(())
}

/// Number of bytes to read for a reply whose payload fits in `capacity`
pub fn reply_read_len(capacity: usize) -> usize {
    (FRAME_OVERHEAD + capacity).min(MAX_FRAME_LEN)
}

/// Validate a raw response frame and extract its payload.
///
/// Checks run in order: minimum length, echo, declared length, checksum,
/// device error flag and finally the caller's payload capacity. Trailing
/// bytes beyond the declared frame (bus padding) are ignored.
pub fn decode_response(
    address: DeviceAddress,
    code: u8,
    raw: &[u8],
    capacity: usize,
) -> Result<Bytes, FilterError> {
    if raw.len() < FRAME_OVERHEAD {
        return Err(ProtocolError::ShortFrame(raw.len()).into());
    }

    let echo = raw[0];
    let len_or_err = raw[1];
    let is_error = echo == (code | ERROR_FLAG);

    if !is_error && echo != code {
        return Err(ProtocolError::UnexpectedEcho { code, echo }.into());
    }

    let total_len = if is_error {
        FRAME_OVERHEAD
    } else {
        FRAME_OVERHEAD + len_or_err as usize
    };

    if total_len > raw.len() {
        // The payload was never read because it cannot fit the caller's buffer
        if !is_error && len_or_err as usize > capacity {
            return Err(ProtocolError::BufferTooSmall {
                len: len_or_err as usize,
                capacity,
            }
            .into());
        }
        return Err(ProtocolError::ShortFrame(raw.len()).into());
    }

    let received = raw[total_len - 1];
    let calculated = frame_checksum(address.read_byte(), &raw[..total_len - 1]);
    if received != calculated {
        return Err(ProtocolError::ChecksumMismatch {
            received,
            calculated,
        }
        .into());
    }

    if is_error {
        return Err(FilterError::Device(len_or_err));
    }

    let len = len_or_err as usize;
    if len > capacity {
        return Err(ProtocolError::BufferTooSmall { len, capacity }.into());
    }

    Ok(Bytes::copy_from_slice(&raw[2..2 + len]))
}

/// Build a success response frame, as a device would send it
pub fn encode_response(
    address: DeviceAddress,
    code: u8,
    payload: &[u8],
) -> Result<Bytes, ProtocolError> {
    let frame_len = FRAME_OVERHEAD + payload.len();
    if frame_len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(frame_len));
    }

    let mut buf = BytesMut::with_capacity(frame_len);
    buf.put_u8(code);
    buf.put_u8(payload.len() as u8);
    buf.put_slice(payload);
    let crc = frame_checksum(address.read_byte(), &buf);
    buf.put_u8(crc);
    Ok(buf.freeze())
}

/// Build an error response frame, as a device would send it
pub fn encode_error_response(address: DeviceAddress, code: u8, error_code: u8) -> Bytes {
    let mut buf = BytesMut::with_capacity(FRAME_OVERHEAD);
    buf.put_u8(code | ERROR_FLAG);
    buf.put_u8(error_code);
    let crc = frame_checksum(address.read_byte(), &buf);
    buf.put_u8(crc);
    buf.freeze()
}
