//! The LED buffer and the pixel-protocol (WS2812-style) output capability.
//!
//! Pixels are stored in wire order (G, R, B), so frames received from the host can be
//! streamed into the buffer and out to the strip byte-for-byte.

use smart_leds::RGB8;

/// Capacity of the LED buffer in pixels.
pub const MAX_LEDS: usize = 64;

/// Bytes per pixel on the wire.
pub const BYTES_PER_PIXEL: usize = 3;

/// Capacity of the LED buffer in bytes.
pub const LED_BUFFER_LEN: usize = MAX_LEDS * BYTES_PER_PIXEL;

/// Number of pixel-protocol outputs.
pub const PIXEL_CHANNEL_COUNT: usize = 3;

/// One of the pixel-protocol outputs.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PixelChannel(u8);

impl PixelChannel {
    /// Every output, in index order.
    pub const ALL: [Self; PIXEL_CHANNEL_COUNT] = [Self(0), Self(1), Self(2)];

    /// Decode the channel byte of a HID report: `1` and `2` select those outputs,
    /// anything else selects output `0`.
    #[must_use]
    pub const fn from_wire(byte: u8) -> Self {
        match byte {
            1 | 2 => Self(byte),
            _ => Self(0),
        }
    }

    /// Output index, `0..PIXEL_CHANNEL_COUNT`.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Emits a correctly timed pixel-protocol waveform.
///
/// # Contract
///
/// Callers must keep interrupts disabled for the whole call; timing is undefined
/// otherwise. Inside this crate every call goes through [`send_pixels`].
pub trait PixelTransmitter {
    /// Shift `bytes` (wire-order pixel data) out on `channel`.
    fn send(&mut self, bytes: &[u8], channel: PixelChannel);
}

/// Transmit `bytes` on `channel` with interrupts disabled for the duration.
pub fn send_pixels<P: PixelTransmitter>(transmitter: &mut P, bytes: &[u8], channel: PixelChannel) {
    critical_section::with(|_| transmitter.send(bytes, channel));
}

/// Fixed-capacity pixel storage, indexed from the first pixel of the active output.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LedBuffer {
    bytes: [u8; LED_BUFFER_LEN],
}

impl LedBuffer {
    /// Create an all-black buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: [0; LED_BUFFER_LEN],
        }
    }

    /// Raw wire-order bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; LED_BUFFER_LEN] {
        &self.bytes
    }

    /// Mutable raw wire-order bytes.
    pub const fn as_bytes_mut(&mut self) -> &mut [u8; LED_BUFFER_LEN] {
        &mut self.bytes
    }

    /// Wire-order bytes of pixels `start..end`, or `None` if the range leaves the buffer.
    #[must_use]
    pub fn pixel_bytes(&self, start: usize, end: usize) -> Option<&[u8]> {
        let start = start.checked_mul(BYTES_PER_PIXEL)?;
        let end = end.checked_mul(BYTES_PER_PIXEL)?;
        self.bytes.get(start..end)
    }

    /// The color of pixel `index`, or `None` past the end of the buffer.
    #[must_use]
    pub fn pixel(&self, index: usize) -> Option<RGB8> {
        match self.pixel_bytes(index, index.checked_add(1)?)? {
            &[g, r, b] => Some(RGB8::new(r, g, b)),
            _ => None,
        }
    }

    /// Store `color` at pixel `index`. Returns `false` (buffer unchanged) past the end.
    pub fn set_pixel(&mut self, index: usize, color: RGB8) -> bool {
        let Some(start) = index.checked_mul(BYTES_PER_PIXEL) else {
            return false;
        };
        match self.bytes.get_mut(start..start.saturating_add(BYTES_PER_PIXEL)) {
            Some(slot) => {
                slot.copy_from_slice(&[color.g, color.r, color.b]);
                true
            }
            None => false,
        }
    }
}

impl Default for LedBuffer {
    fn default() -> Self {
        Self::new()
    }
}
