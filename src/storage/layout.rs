//! Fixed memory map of the EEPROM blocks and the flash record log.
//!
//! ```text
//! EEPROM                              External flash
//! 0x10  mode      [mode][crc8]        0x000100  record 0
//! 0x20  identity  [0xA5][id ×4]       0x000105  record 1
//! 0x30  settings  [postcard…][crc8]   …         base + index × 5
//! ```

use crate::record::RECORD_SIZE;

pub const MODE_ADDR: u16 = 0x10;
pub const MODE_BLOCK_LEN: usize = 2;

pub const IDENTITY_ADDR: u16 = 0x20;
pub const IDENTITY_MAGIC: u8 = 0xA5;
pub const IDENTITY_BLOCK_LEN: usize = 5;

pub const SETTINGS_ADDR: u16 = 0x30;
/// Serialized settings plus trailing CRC-8.
pub const SETTINGS_BLOCK_LEN: usize = 48;
pub const SETTINGS_PAYLOAD_LEN: usize = SETTINGS_BLOCK_LEN - 1;

/// Start of the record log in external flash.
pub const FLASH_LOG_BASE: u32 = 0x00_0100;
/// Program granularity of the flash; a program never crosses a page.
pub const FLASH_PAGE_SIZE: u32 = 256;

/// Flash address of record `index`.
pub const fn record_address(index: u32) -> u32 {
    FLASH_LOG_BASE + index * RECORD_SIZE as u32
}
