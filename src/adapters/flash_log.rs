//! External NOR flash adapter for the record log.
//!
//! On ESP-IDF the log lives in a raw data partition labelled `reclog`.
//! The host backend models NOR behaviour closely enough to catch layout
//! bugs: programming only clears bits, a program must stay inside one
//! page, erase returns everything to 0xFF, and the chip must be opened
//! (woken from deep power-down) before use.

use log::info;

use crate::app::ports::FlashMemory;
use crate::error::StorageError;
use crate::storage::layout::FLASH_PAGE_SIZE;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Size of the simulated flash in bytes.
#[cfg(not(target_os = "espidf"))]
pub const SIM_FLASH_SIZE: usize = 64 * 1024;

pub struct FlashLogAdapter {
    powered: bool,
    #[cfg(target_os = "espidf")]
    partition: *const esp_partition_t,
    #[cfg(not(target_os = "espidf"))]
    cells: Vec<u8>,
}

impl FlashLogAdapter {
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: the label is NUL-terminated; the returned pointer
            // refers to the static partition table.
            let partition = unsafe {
                esp_partition_find_first(
                    esp_partition_type_t_ESP_PARTITION_TYPE_DATA,
                    esp_partition_subtype_t_ESP_PARTITION_SUBTYPE_ANY,
                    b"reclog\0".as_ptr().cast(),
                )
            };
            if partition.is_null() {
                return Err(StorageError::Io);
            }
            info!("FLASH: record log partition found");
            Ok(Self {
                powered: false,
                partition,
            })
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("FLASH: simulation backend ({} bytes)", SIM_FLASH_SIZE);
            Ok(Self {
                powered: false,
                cells: vec![0xFF; SIM_FLASH_SIZE],
            })
        }
    }

    fn check(&self, addr: u32, len: usize) -> Result<(), StorageError> {
        if !self.powered {
            return Err(StorageError::Io);
        }
        let end = addr as usize + len;
        if end > self.size() {
            return Err(StorageError::OutOfBounds);
        }
        Ok(())
    }

    fn size(&self) -> usize {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: `partition` was checked non-null at construction.
            unsafe { (*self.partition).size as usize }
        }
        #[cfg(not(target_os = "espidf"))]
        {
            self.cells.len()
        }
    }
}

impl FlashMemory for FlashLogAdapter {
    fn flash_open(&mut self) -> Result<(), StorageError> {
        self.powered = true;
        Ok(())
    }

    fn flash_close(&mut self) {
        self.powered = false;
    }

    fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), StorageError> {
        self.check(addr, data.len())?;
        if data.is_empty() {
            return Ok(());
        }
        let last = addr + data.len() as u32 - 1;
        if addr / FLASH_PAGE_SIZE != last / FLASH_PAGE_SIZE {
            return Err(StorageError::OutOfBounds);
        }

        #[cfg(target_os = "espidf")]
        {
            // SAFETY: range checked against the partition size above.
            esp!(unsafe {
                esp_partition_write(self.partition, addr as usize, data.as_ptr().cast(), data.len())
            })
            .map_err(|_| StorageError::Io)
        }

        #[cfg(not(target_os = "espidf"))]
        {
            let start = addr as usize;
            for (cell, byte) in self.cells[start..start + data.len()].iter_mut().zip(data) {
                *cell &= *byte;
            }
            Ok(())
        }
    }

    fn flash_read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        self.check(addr, buf.len())?;

        #[cfg(target_os = "espidf")]
        {
            // SAFETY: range checked against the partition size above.
            esp!(unsafe {
                esp_partition_read(self.partition, addr as usize, buf.as_mut_ptr().cast(), buf.len())
            })
            .map_err(|_| StorageError::Io)
        }

        #[cfg(not(target_os = "espidf"))]
        {
            let start = addr as usize;
            buf.copy_from_slice(&self.cells[start..start + buf.len()]);
            Ok(())
        }
    }

    fn flash_erase(&mut self) -> Result<(), StorageError> {
        self.check(0, 0)?;

        #[cfg(target_os = "espidf")]
        {
            // SAFETY: erases exactly the partition's own extent.
            esp!(unsafe { esp_partition_erase_range(self.partition, 0, self.size()) })
                .map_err(|_| StorageError::Io)
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.cells.fill(0xFF);
            Ok(())
        }
    }
}
