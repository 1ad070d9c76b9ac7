//! Checksums used by the persisted blocks, the record codec and the
//! uplink frames.
//!
//! - CRC-8 (poly 0x07, init 0x00, no reflection, no xor-out) guards the
//!   EEPROM mode/settings blocks and every radio frame.
//! - CRC-4 (poly x^4 + x + 1, init 0, MSB first) guards the 20-bit record
//!   timestamp.  Any single-bit flip in the 24 timestamp+CRC bits changes
//!   the syndrome.

use crc::{CRC_8_SMBUS, Crc};

const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// CRC-8 over `data`.
pub fn crc8(data: &[u8]) -> u8 {
    CRC8.checksum(data)
}

/// Width of the record timestamp field in bits.
pub const TIMESTAMP_BITS: u32 = 20;

const CRC4_POLY: u8 = 0x03;

/// CRC-4 over the low 20 bits of `timestamp`.
pub fn crc4_timestamp(timestamp: u32) -> u8 {
    let mut crc: u8 = 0;
    for i in (0..TIMESTAMP_BITS).rev() {
        let bit = ((timestamp >> i) & 1) as u8;
        let top = (crc >> 3) & 1;
        crc = (crc << 1) & 0x0F;
        if top ^ bit != 0 {
            crc ^= CRC4_POLY;
        }
    }
    crc
}
