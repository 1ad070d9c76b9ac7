//! Byte-addressable EEPROM adapter.
//!
//! Implements [`Eeprom`] over a 256-byte image.  On ESP-IDF the image lives
//! in one NVS blob and every write commits it (NVS commits are atomic); on
//! the host it stays in RAM, erased to 0xFF like a fresh part.

use log::info;

use crate::app::ports::Eeprom;
use crate::error::StorageError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::warn;

/// Size of the emulated EEPROM in bytes.
pub const EEPROM_SIZE: usize = 256;

#[cfg(target_os = "espidf")]
const NAMESPACE: &[u8] = b"templogger\0";
#[cfg(target_os = "espidf")]
const IMAGE_KEY: &[u8] = b"eeprom\0";

pub struct EepromAdapter {
    image: [u8; EEPROM_SIZE],
}

impl EepromAdapter {
    /// Bring up the backing store and load the image.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS use.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("EEPROM: NVS partition stale, erasing");
                esp!(unsafe { nvs_flash_erase() }).map_err(|_| StorageError::Io)?;
                esp!(unsafe { nvs_flash_init() }).map_err(|_| StorageError::Io)?;
            } else if ret != ESP_OK {
                return Err(StorageError::Io);
            }

            let mut image = [0xFFu8; EEPROM_SIZE];
            Self::with_handle(nvs_open_mode_t_NVS_READONLY, |handle| {
                let mut size = EEPROM_SIZE;
                // SAFETY: `image` outlives the call and `size` bounds the copy.
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        IMAGE_KEY.as_ptr().cast(),
                        image.as_mut_ptr().cast(),
                        &mut size,
                    )
                };
                if ret == ESP_ERR_NVS_NOT_FOUND {
                    info!("EEPROM: no stored image, starting blank");
                    return Ok(());
                }
                esp!(ret).map_err(|_| StorageError::Io)
            })
            .or_else(|e| {
                // A missing namespace on first boot is not an error.
                warn!("EEPROM: image not loaded ({}), starting blank", e);
                Ok::<(), StorageError>(())
            })?;
            info!("EEPROM: NVS-backed image ready");
            Ok(Self { image })
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("EEPROM: simulation backend");
            Ok(Self {
                image: [0xFF; EEPROM_SIZE],
            })
        }
    }

    /// Direct view of the image (host diagnostics and tests).
    pub fn image(&self) -> &[u8; EEPROM_SIZE] {
        &self.image
    }

    fn range(addr: u16, len: usize) -> Result<core::ops::Range<usize>, StorageError> {
        let start = addr as usize;
        let end = start.checked_add(len).ok_or(StorageError::OutOfBounds)?;
        if end > EEPROM_SIZE {
            return Err(StorageError::OutOfBounds);
        }
        Ok(start..end)
    }

    #[cfg(target_os = "espidf")]
    fn with_handle<T>(
        mode: nvs_open_mode_t,
        f: impl FnOnce(nvs_handle_t) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut handle: nvs_handle_t = 0;
        // SAFETY: NAMESPACE is NUL-terminated; `handle` is a valid out pointer.
        esp!(unsafe { nvs_open(NAMESPACE.as_ptr().cast(), mode, &mut handle) })
            .map_err(|_| StorageError::Io)?;
        let result = f(handle);
        // SAFETY: handle was opened above and is closed exactly once.
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn commit(&self) -> Result<(), StorageError> {
        Self::with_handle(nvs_open_mode_t_NVS_READWRITE, |handle| {
            // SAFETY: the image buffer is valid for EEPROM_SIZE bytes.
            esp!(unsafe {
                nvs_set_blob(
                    handle,
                    IMAGE_KEY.as_ptr().cast(),
                    self.image.as_ptr().cast(),
                    EEPROM_SIZE,
                )
            })
            .map_err(|_| StorageError::Io)?;
            esp!(unsafe { nvs_commit(handle) }).map_err(|_| StorageError::Io)
        })
    }
}

impl Eeprom for EepromAdapter {
    fn eeprom_read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), StorageError> {
        let range = Self::range(addr, buf.len())?;
        buf.copy_from_slice(&self.image[range]);
        Ok(())
    }

    fn eeprom_write(&mut self, addr: u16, data: &[u8]) -> Result<(), StorageError> {
        let range = Self::range(addr, data.len())?;
        self.image[range].copy_from_slice(data);

        #[cfg(target_os = "espidf")]
        self.commit()?;

        Ok(())
    }
}
