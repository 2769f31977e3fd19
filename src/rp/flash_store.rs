//! A [`ConfigStore`] kept in RAM and written back to the last sector of flash.
//!
//! Writes only touch the RAM image; [`ConfigStore::flush`] erases and reprograms the
//! sector, and only when the image changed since the last flush.
//!
//! Sector layout: `MAGIC` (4 bytes, little endian), the 128-byte image, then a CRC-32
//! over both. A blank or corrupted sector loads as an erased image (every byte
//! [`ERASED_BYTE`]), the same as a never-written EEPROM.

use embassy_rp::Peri;
use embassy_rp::flash::{Blocking, ERASE_SIZE, Flash};
use embassy_rp::peripherals::FLASH;

use crate::config_store::{
    CONFIG_STORE_LEN, ConfigStore, ERASED_BYTE, RamConfigStore, checked_range,
};
use crate::{Error, Result};

/// Internal flash size for Raspberry Pi Pico 1 (2 MB).
pub const INTERNAL_FLASH_SIZE: usize = 2 * 1024 * 1024;

const MAGIC: u32 = 0x4245_4E56; // 'BENV'
const MAGIC_SIZE: usize = 4;
const CRC_SIZE: usize = 4;
const RECORD_SIZE: usize = MAGIC_SIZE + CONFIG_STORE_LEN + CRC_SIZE;

// One flash program page.
const PAGE_SIZE: usize = 256;

// Reserved in memory-pico1.x, outside the firmware image.
const SECTOR_OFFSET: u32 = (INTERNAL_FLASH_SIZE - ERASE_SIZE) as u32;

const _: () = assert!(RECORD_SIZE <= PAGE_SIZE);

/// Flash-backed configuration store.
pub struct FlashConfigStore {
    flash: Flash<'static, FLASH, Blocking, INTERNAL_FLASH_SIZE>,
    image: RamConfigStore,
    dirty: bool,
}

impl FlashConfigStore {
    /// Take the flash peripheral and load the persisted image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Flash`] if the sector cannot be read.
    pub fn new(peripheral: Peri<'static, FLASH>) -> Result<Self> {
        let mut flash = Flash::new_blocking(peripheral);
        let mut page = [0u8; PAGE_SIZE];
        flash
            .blocking_read(SECTOR_OFFSET, &mut page)
            .map_err(Error::Flash)?;

        let image = match decode_record(&page) {
            Ok(image) => {
                info!("Flash: Loaded configuration");
                image
            }
            Err(err) => {
                warn!("Flash: {}; starting erased", err);
                [ERASED_BYTE; CONFIG_STORE_LEN]
            }
        };
        Ok(Self {
            flash,
            image: RamConfigStore::from_image(image),
            dirty: false,
        })
    }

    fn save(&mut self) -> Result<()> {
        let page = encode_record(self.image.image());
        self.flash
            .blocking_erase(SECTOR_OFFSET, SECTOR_OFFSET + ERASE_SIZE as u32)
            .map_err(Error::Flash)?;
        self.flash
            .blocking_write(SECTOR_OFFSET, &page)
            .map_err(Error::Flash)?;
        debug!("Flash: Saved configuration");
        Ok(())
    }
}

impl ConfigStore for FlashConfigStore {
    fn read(&mut self, offset: usize, buffer: &mut [u8]) -> Result<()> {
        self.image.read(offset, buffer)
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let range = checked_range(offset, bytes.len())?;
        if self.image.image().get(range) == Some(bytes) {
            return Ok(());
        }
        self.image.write(offset, bytes)?;
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.save()?;
        self.dirty = false;
        Ok(())
    }
}

fn encode_record(image: &[u8; CONFIG_STORE_LEN]) -> [u8; PAGE_SIZE] {
    let mut page = [ERASED_BYTE; PAGE_SIZE];
    let (magic, rest) = page.split_at_mut(MAGIC_SIZE);
    magic.copy_from_slice(&MAGIC.to_le_bytes());
    let (body, rest) = rest.split_at_mut(CONFIG_STORE_LEN);
    body.copy_from_slice(image);
    let crc = compute_crc(&[MAGIC.to_le_bytes().as_slice(), image.as_slice()]);
    if let Some(slot) = rest.get_mut(..CRC_SIZE) {
        slot.copy_from_slice(&crc.to_le_bytes());
    }
    page
}

fn decode_record(page: &[u8; PAGE_SIZE]) -> Result<[u8; CONFIG_STORE_LEN]> {
    let (magic, rest) = page.split_at(MAGIC_SIZE);
    let (body, rest) = rest.split_at(CONFIG_STORE_LEN);
    if magic != MAGIC.to_le_bytes() {
        return Err(Error::StorageCorrupted);
    }
    let stored_crc = rest
        .get(..CRC_SIZE)
        .and_then(|crc| <[u8; CRC_SIZE]>::try_from(crc).ok())
        .map(u32::from_le_bytes)
        .ok_or(Error::StorageCorrupted)?;
    let computed_crc = compute_crc(&[magic, body]);
    if stored_crc != computed_crc {
        error!(
            "Flash: CRC mismatch (expected {}, found {})",
            computed_crc, stored_crc
        );
        return Err(Error::StorageCorrupted);
    }
    <[u8; CONFIG_STORE_LEN]>::try_from(body).map_err(|_| Error::StorageCorrupted)
}

fn compute_crc(parts: &[&[u8]]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize()
}
