//! A byte-addressable persistent region holding device identity and settings.
//!
//! The region follows a fixed, versioned memory map:
//!
//! | Offset  | Length | Contents                 |
//! |---------|--------|--------------------------|
//! | `0`     | 1      | reserved                 |
//! | `1–12`  | 12     | serial number            |
//! | `13`    | 1      | operating [`Mode`]       |
//! | `14–31` | 18     | reserved                 |
//! | `32–63` | 32     | name (HID report 2)      |
//! | `64–95` | 32     | data blob (HID report 3) |
//! | `96+`   |        | reserved                 |
//!
//! See [`ConfigStore`] for the access contract and [`RamConfigStore`] for an
//! in-memory implementation.

use core::ops::Range;

use heapless::String;

use crate::mode::Mode;
use crate::{Error, Result};

/// Size of the persistent region in bytes.
pub const CONFIG_STORE_LEN: usize = 128;

/// Value of a byte that has never been written (erased EEPROM or flash).
pub const ERASED_BYTE: u8 = 0xFF;

/// Length of the serial number, e.g. `BS000123-1.0`.
pub const SERIAL_NUMBER_LEN: usize = 12;

/// Bytes `1–12`: serial number.
pub const SERIAL_NUMBER_REGION: Range<usize> = 1..13;

/// Byte `13`: persisted operating mode.
pub const MODE_OFFSET: usize = 13;

/// Bytes `32–63`: free-text device name.
pub const NAME_REGION: Range<usize> = 32..64;

/// Bytes `64–95`: free-form data blob.
pub const DATA_REGION: Range<usize> = 64..96;

// Regions must not overlap and must fit inside the store.
const _: () = {
    assert!(SERIAL_NUMBER_REGION.end <= MODE_OFFSET);
    assert!(MODE_OFFSET < NAME_REGION.start);
    assert!(NAME_REGION.end <= DATA_REGION.start);
    assert!(DATA_REGION.end <= CONFIG_STORE_LEN);
};

/// Synchronous access to the persistent region.
///
/// Every access is range-checked against [`CONFIG_STORE_LEN`]; an access that would
/// leave the region returns [`Error::IndexOutOfBounds`] without touching the medium.
/// Calls block until the medium has completed the operation.
pub trait ConfigStore {
    /// Fill `buffer` with the bytes stored at `offset..offset + buffer.len()`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfBounds`] if the range leaves the region, or a
    /// medium-specific error if the read fails.
    fn read(&mut self, offset: usize, buffer: &mut [u8]) -> Result<()>;

    /// Store `bytes` at `offset..offset + bytes.len()`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfBounds`] if the range leaves the region, or a
    /// medium-specific error if the write fails.
    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<()>;

    /// Commit buffered writes to the medium.
    ///
    /// A multi-packet report reaches the store as several [`write`](Self::write)s and
    /// is flushed once at the end. Stores with no write-back buffer keep the default.
    ///
    /// # Errors
    ///
    /// Propagates the medium's write error.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Load the persisted mode, normalizing unknown values to [`Mode::Analog`].
    ///
    /// A read failure also yields [`Mode::Analog`]; the mode byte is never an error
    /// source for the caller.
    fn load_mode(&mut self) -> Mode {
        let mut byte = [ERASED_BYTE];
        if let Err(err) = self.read(MODE_OFFSET, &mut byte) {
            error!("Store: mode read failed: {}", err);
        }
        let [byte] = byte;
        Mode::from_stored(byte)
    }

    /// Persist `mode` to the mode byte and flush it.
    ///
    /// # Errors
    ///
    /// Propagates the medium's write error.
    fn persist_mode(&mut self, mode: Mode) -> Result<()> {
        self.write(MODE_OFFSET, &[mode.into()])?;
        self.flush()
    }

    /// Render the persisted serial number as the USB serial-number string.
    ///
    /// Bytes outside printable ASCII (including erased `0xFF` bytes) become `?`.
    ///
    /// # Errors
    ///
    /// Propagates the medium's read error.
    fn serial_number(&mut self) -> Result<String<SERIAL_NUMBER_LEN>> {
        let mut raw = [0u8; SERIAL_NUMBER_LEN];
        self.read(SERIAL_NUMBER_REGION.start, &mut raw)?;
        let mut serial = String::new();
        for byte in raw {
            let ch = if byte.is_ascii_graphic() || byte == b' ' {
                char::from(byte)
            } else {
                '?'
            };
            // Capacity equals the raw length, so the push cannot fail.
            let _ = serial.push(ch);
        }
        Ok(serial)
    }
}

/// Range-check an access of `len` bytes at `offset` against the region.
///
/// # Errors
///
/// Returns [`Error::IndexOutOfBounds`] if the access would leave the region.
pub fn checked_range(offset: usize, len: usize) -> Result<Range<usize>> {
    let end = offset.checked_add(len).ok_or(Error::IndexOutOfBounds)?;
    if end > CONFIG_STORE_LEN {
        return Err(Error::IndexOutOfBounds);
    }
    Ok(offset..end)
}

/// A [`ConfigStore`] held entirely in RAM.
///
/// Used by the host simulation and as the working copy behind flash-backed stores.
/// Cloning the store and constructing a new one from [`image`](Self::image) models a
/// power cycle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RamConfigStore {
    image: [u8; CONFIG_STORE_LEN],
}

impl RamConfigStore {
    /// Create a store in the erased state (every byte [`ERASED_BYTE`]).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            image: [ERASED_BYTE; CONFIG_STORE_LEN],
        }
    }

    /// Create a store from a previously persisted image.
    #[must_use]
    pub const fn from_image(image: [u8; CONFIG_STORE_LEN]) -> Self {
        Self { image }
    }

    /// The raw persisted bytes.
    #[must_use]
    pub const fn image(&self) -> &[u8; CONFIG_STORE_LEN] {
        &self.image
    }
}

impl Default for RamConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for RamConfigStore {
    fn read(&mut self, offset: usize, buffer: &mut [u8]) -> Result<()> {
        let range = checked_range(offset, buffer.len())?;
        let source = self.image.get(range).ok_or(Error::IndexOutOfBounds)?;
        buffer.copy_from_slice(source);
        Ok(())
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let range = checked_range(offset, bytes.len())?;
        let target = self.image.get_mut(range).ok_or(Error::IndexOutOfBounds)?;
        target.copy_from_slice(bytes);
        Ok(())
    }
}
