//! Temperature log record and its fixed 5-byte encoding.
//!
//! The same encoding is used in external flash and inside uplink data
//! packets:
//!
//! ```text
//!  byte 0      byte 1      byte 2           byte 3      byte 4
//! ┌──────────┬──────────┬───────┬──────┬──────────┬───────┬───────┐
//! │ ts[7:0]  │ ts[15:8] │ts[19:16]│crc4│ tf[11:4] │tf[3:0]│ flags │
//! └──────────┴──────────┴───────┴──────┴──────────┴───────┴───────┘
//!   ts = 20-bit timestamp (5-minute ticks)
//!   tf = round((T + 50) * 16), 12-bit fixed point
//! ```

use crate::checksum::crc4_timestamp;
use crate::error::CodecError;

/// Size of one encoded record in bytes.
pub const RECORD_SIZE: usize = 5;

/// Largest timestamp representable in the 20-bit field.
pub const TIMESTAMP_MAX: u32 = 0xF_FFFF;

/// Temperature offset applied before fixed-point scaling (°C).
const TEMP_OFFSET_C: f32 = 50.0;
/// Fixed-point scale: 1/16 °C per LSB.
const TEMP_SCALE: f32 = 16.0;
const TEMP_FIXED_MAX: u16 = 0x0FFF;

/// Record flag bits (low nibble of byte 4).
pub mod flags {
    /// Measurement completed normally.
    pub const VALID: u8 = 0x01;
    /// Sensor reported a fault while sampling.
    pub const SENSOR_ERROR: u8 = 0x02;
    pub const MASK: u8 = 0x0F;
}

/// One logged temperature sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    /// 5-minute ticks since the logging epoch.
    pub timestamp: u32,
    /// Temperature in °C.
    pub temperature_c: f32,
    /// See [`flags`].
    pub flags: u8,
}

impl Record {
    /// A normal sample.
    pub fn valid(timestamp: u32, temperature_c: f32) -> Self {
        Self {
            timestamp,
            temperature_c,
            flags: flags::VALID,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.flags & flags::VALID != 0
    }

    /// Encode into the 5-byte wire/flash form.
    ///
    /// Timestamps wider than 20 bits are truncated; temperatures outside
    /// the representable range (-50 … +205.9375 °C) are clamped.
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let ts = self.timestamp & TIMESTAMP_MAX;
        let crc = crc4_timestamp(ts);
        let fixed = temperature_to_fixed(self.temperature_c);
        let fl = self.flags & flags::MASK;

        [
            (ts & 0xFF) as u8,
            ((ts >> 8) & 0xFF) as u8,
            (((ts >> 16) & 0x0F) as u8) << 4 | crc,
            (fixed >> 4) as u8,
            ((fixed & 0x0F) as u8) << 4 | fl,
        ]
    }

    /// Decode a 5-byte record, rejecting it when the timestamp CRC does
    /// not match.
    pub fn decode(raw: &[u8; RECORD_SIZE]) -> Result<Self, CodecError> {
        let ts = u32::from(raw[0]) | u32::from(raw[1]) << 8 | u32::from(raw[2] >> 4) << 16;
        if raw[2] & 0x0F != crc4_timestamp(ts) {
            return Err(CodecError::BadCrc);
        }
        let fixed = u16::from(raw[3]) << 4 | u16::from(raw[4] >> 4);

        Ok(Self {
            timestamp: ts,
            temperature_c: fixed_to_temperature(fixed),
            flags: raw[4] & flags::MASK,
        })
    }
}

fn temperature_to_fixed(temperature_c: f32) -> u16 {
    let scaled = ((temperature_c + TEMP_OFFSET_C) * TEMP_SCALE).round();
    if scaled.is_nan() || scaled <= 0.0 {
        0
    } else if scaled >= f32::from(TEMP_FIXED_MAX) {
        TEMP_FIXED_MAX
    } else {
        scaled as u16
    }
}

fn fixed_to_temperature(fixed: u16) -> f32 {
    f32::from(fixed) / TEMP_SCALE - TEMP_OFFSET_C
}
