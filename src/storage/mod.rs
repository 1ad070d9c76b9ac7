//! Persistent store: CRC-guarded mode and settings blocks in EEPROM, the
//! write-once device identity, and the append-only record log in flash.
//!
//! Integrity failures never propagate as fatal: an unusable mode block
//! reads as [`Mode::Test`], unusable settings are replaced by defaults and
//! written back.  The only log cursor is `Settings::flash_record_count`.
//!
//! When the log reaches its capacity further appends are refused with
//! [`StorageError::LogFull`]; existing records are never overwritten.

pub mod layout;

use log::{info, warn};

use crate::app::ports::{Eeprom, FlashMemory};
use crate::checksum::crc8;
use crate::config::Settings;
use crate::error::{Error, StorageError};
use crate::fsm::Mode;
use crate::record::{RECORD_SIZE, Record};
use layout::*;

/// Where the settings in memory came from after [`PersistentStore::load_settings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsOrigin {
    Stored,
    /// Block missing, corrupt or out of range; defaults were persisted.
    Defaults,
}

/// Outcome of a bulk append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchAppend {
    /// Records written from the front of the batch.
    pub written: usize,
    /// Why the batch stopped early, if it did.
    pub error: Option<StorageError>,
}

pub struct PersistentStore {
    settings: Settings,
    capacity: u32,
}

impl PersistentStore {
    pub fn new(capacity: u32) -> Self {
        Self {
            settings: Settings::default(),
            capacity,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn record_count(&self) -> u32 {
        self.settings.flash_record_count
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    // ═══════════════════════════════════════════════════════════
    //  Mode
    // ═══════════════════════════════════════════════════════════

    /// Mode to resume in.  Anything but a CRC-valid durable mode yields
    /// [`Mode::Test`].
    pub fn load_mode(&self, hw: &mut impl Eeprom) -> Mode {
        let mut block = [0u8; MODE_BLOCK_LEN];
        if let Err(e) = hw.eeprom_read(MODE_ADDR, &mut block) {
            warn!("STORE: mode read failed: {}", e);
            return Mode::Test;
        }
        if crc8(&block[..1]) != block[1] {
            info!("STORE: no valid mode block, starting in Test");
            return Mode::Test;
        }
        match Mode::from_u8(block[0]) {
            Some(mode) if mode.is_durable() => mode,
            Some(mode) => {
                info!("STORE: transient mode {:?} stored, starting in Test", mode);
                Mode::Test
            }
            None => Mode::Test,
        }
    }

    pub fn persist_mode(&self, hw: &mut impl Eeprom, mode: Mode) -> Result<(), StorageError> {
        let raw = mode as u8;
        hw.eeprom_write(MODE_ADDR, &[raw, crc8(&[raw])])
    }

    /// Make the stored mode unreadable so the next boot starts in `Test`.
    pub fn invalidate_mode(&self, hw: &mut impl Eeprom) -> Result<(), StorageError> {
        hw.eeprom_write(MODE_ADDR, &[0xFF; MODE_BLOCK_LEN])
    }

    // ═══════════════════════════════════════════════════════════
    //  Identity
    // ═══════════════════════════════════════════════════════════

    /// Device id from the write-once identity block.
    pub fn read_device_id(&self, hw: &mut impl Eeprom) -> Option<[u8; 4]> {
        let mut block = [0u8; IDENTITY_BLOCK_LEN];
        hw.eeprom_read(IDENTITY_ADDR, &mut block).ok()?;
        (block[0] == IDENTITY_MAGIC).then(|| [block[1], block[2], block[3], block[4]])
    }

    /// Program the identity block.  Refuses when it is already programmed.
    pub fn provision_device_id(&mut self, hw: &mut impl Eeprom, id: [u8; 4]) -> Result<(), StorageError> {
        if self.read_device_id(hw).is_some() {
            return Err(StorageError::AlreadyProvisioned);
        }
        hw.eeprom_write(
            IDENTITY_ADDR,
            &[IDENTITY_MAGIC, id[0], id[1], id[2], id[3]],
        )?;
        self.settings.device_id = id;
        self.save_settings(hw)?;
        info!("STORE: provisioned device id {:02X?}", id);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    //  Settings
    // ═══════════════════════════════════════════════════════════

    /// Load settings, falling back to defaults (and persisting them) when
    /// the block is corrupt or out of range.
    pub fn load_settings(&mut self, hw: &mut impl Eeprom) -> SettingsOrigin {
        let origin = match Self::read_settings_block(hw) {
            Ok(settings) => {
                self.settings = settings;
                SettingsOrigin::Stored
            }
            Err(e) => {
                warn!("STORE: settings unusable ({}), restoring defaults", e);
                self.settings = Settings::default();
                SettingsOrigin::Defaults
            }
        };

        if let Some(id) = self.read_device_id(hw) {
            self.settings.device_id = id;
        }

        if origin == SettingsOrigin::Defaults {
            if let Err(e) = self.save_settings(hw) {
                warn!("STORE: could not persist default settings: {}", e);
            }
        }
        origin
    }

    fn read_settings_block(hw: &mut impl Eeprom) -> Result<Settings, Error> {
        let mut block = [0u8; SETTINGS_BLOCK_LEN];
        hw.eeprom_read(SETTINGS_ADDR, &mut block)?;
        let (payload, crc) = block.split_at(SETTINGS_PAYLOAD_LEN);
        if crc8(payload) != crc[0] {
            return Err(StorageError::Corrupted.into());
        }
        let settings: Settings =
            postcard::from_bytes(payload).map_err(|_| StorageError::Corrupted)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save_settings(&self, hw: &mut impl Eeprom) -> Result<(), StorageError> {
        let mut block = [0u8; SETTINGS_BLOCK_LEN];
        postcard::to_slice(&self.settings, &mut block[..SETTINGS_PAYLOAD_LEN])
            .map_err(|_| StorageError::Encoding)?;
        block[SETTINGS_PAYLOAD_LEN] = crc8(&block[..SETTINGS_PAYLOAD_LEN]);
        hw.eeprom_write(SETTINGS_ADDR, &block)
    }

    /// Apply `change` to a copy of the settings; validate and persist it
    /// before it replaces the live settings.
    pub fn update_settings(
        &mut self,
        hw: &mut impl Eeprom,
        change: impl FnOnce(&mut Settings),
    ) -> Result<(), Error> {
        let mut candidate = self.settings.clone();
        change(&mut candidate);
        candidate.validate()?;
        let previous = core::mem::replace(&mut self.settings, candidate);
        if let Err(e) = self.save_settings(hw) {
            self.settings = previous;
            return Err(e.into());
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    //  Record log
    // ═══════════════════════════════════════════════════════════

    /// Append one record at the cursor and persist the new count.
    /// Returns the record's index.
    ///
    /// An error means the record is not in flash.  Once programmed, the
    /// record counts as logged even if the count cannot be saved; the
    /// count goes out with the next successful settings write.
    pub fn append_record<H: Eeprom + FlashMemory>(
        &mut self,
        hw: &mut H,
        record: &Record,
    ) -> Result<u32, StorageError> {
        let index = self.settings.flash_record_count;
        if index >= self.capacity {
            warn!("STORE: log full ({} records), record refused", index);
            return Err(StorageError::LogFull);
        }
        with_flash(hw, |hw| program(hw, record_address(index), &record.encode()))?;
        self.settings.flash_record_count = index + 1;
        self.persist_count(hw);
        Ok(index)
    }

    /// Append `records` in order and persist the count once.  Stops at the
    /// first failure; the written prefix is kept and reported as written
    /// even if the count cannot be saved.
    pub fn append_batch<H: Eeprom + FlashMemory>(&mut self, hw: &mut H, records: &[Record]) -> BatchAppend {
        let start = self.settings.flash_record_count;
        let mut written = 0usize;
        let mut error = None;

        if let Err(e) = hw.flash_open() {
            return BatchAppend {
                written: 0,
                error: Some(e),
            };
        }
        for record in records {
            let index = start + written as u32;
            if index >= self.capacity {
                warn!("STORE: log full during batch after {} records", written);
                error = Some(StorageError::LogFull);
                break;
            }
            if let Err(e) = program(hw, record_address(index), &record.encode()) {
                error = Some(e);
                break;
            }
            written += 1;
        }
        hw.flash_close();

        if written > 0 {
            self.settings.flash_record_count = start + written as u32;
            self.persist_count(hw);
        }
        BatchAppend { written, error }
    }

    /// Save the advanced append cursor; failure is only logged.
    fn persist_count(&self, hw: &mut impl Eeprom) {
        if let Err(e) = self.save_settings(hw) {
            warn!(
                "STORE: record count {} not persisted: {}",
                self.settings.flash_record_count, e
            );
        }
    }

    /// Read and CRC-check record `index`.
    pub fn read_record(&self, hw: &mut impl FlashMemory, index: u32) -> Result<Record, StorageError> {
        if index >= self.settings.flash_record_count {
            return Err(StorageError::OutOfBounds);
        }
        let mut raw = [0u8; RECORD_SIZE];
        with_flash(hw, |hw| hw.flash_read(record_address(index), &mut raw))?;
        Record::decode(&raw).map_err(|_| StorageError::Corrupted)
    }

    /// Erase the log and reset its cursors.  Sets the one-shot
    /// `flash_erased` flag.
    pub fn erase_log<H: Eeprom + FlashMemory>(&mut self, hw: &mut H) -> Result<(), StorageError> {
        with_flash(hw, |hw| hw.flash_erase())?;
        self.settings.flash_record_count = 0;
        self.settings.uplink_cursor = 0;
        self.settings.flash_erased = true;
        self.save_settings(hw)?;
        info!("STORE: record log erased");
        Ok(())
    }

    /// Record that records `[0, cursor)` reached the gateway.
    pub fn mark_delivered(&mut self, hw: &mut impl Eeprom, cursor: u32) -> Result<(), StorageError> {
        self.settings.uplink_cursor = cursor.min(self.settings.flash_record_count);
        self.save_settings(hw)
    }

    /// Clear the erased flag once a handshake has reported it.
    pub fn clear_erased_flag(&mut self, hw: &mut impl Eeprom) -> Result<(), StorageError> {
        if !self.settings.flash_erased {
            return Ok(());
        }
        self.settings.flash_erased = false;
        self.save_settings(hw)
    }

    /// Defaults (keeping the provisioned identity), empty log, and a mode
    /// block that reads as `Test`.
    pub fn factory_reset<H: Eeprom + FlashMemory>(&mut self, hw: &mut H) -> Result<(), StorageError> {
        let device_id = self.settings.device_id;
        with_flash(hw, |hw| hw.flash_erase())?;
        self.settings = Settings {
            device_id,
            ..Settings::default()
        };
        self.save_settings(hw)?;
        self.invalidate_mode(hw)?;
        warn!("STORE: factory reset");
        Ok(())
    }
}

/// Run `op` with the flash powered up, closing it afterwards.
fn with_flash<H: FlashMemory, T>(
    hw: &mut H,
    op: impl FnOnce(&mut H) -> Result<T, StorageError>,
) -> Result<T, StorageError> {
    hw.flash_open()?;
    let result = op(hw);
    hw.flash_close();
    result
}

/// Program `data`, split so no single program crosses a page boundary.
fn program(hw: &mut impl FlashMemory, addr: u32, data: &[u8]) -> Result<(), StorageError> {
    let mut addr = addr;
    let mut rest = data;
    while !rest.is_empty() {
        let room = (FLASH_PAGE_SIZE - addr % FLASH_PAGE_SIZE) as usize;
        let (chunk, tail) = rest.split_at(room.min(rest.len()));
        hw.page_program(addr, chunk)?;
        addr += chunk.len() as u32;
        rest = tail;
    }
    Ok(())
}
