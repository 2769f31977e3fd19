//! Operating modes and the side effects of applying one.
//!
//! See [`apply_mode`].

use derive_more::Display;
use embedded_hal::delay::DelayNs;

use crate::pixel::{PixelChannel, PixelTransmitter, BYTES_PER_PIXEL};
use crate::pwm_color::{ColorChannel, PwmClock, PwmColor};

/// Intensity of the "mode applied" acknowledgment flash.
pub const ACK_INTENSITY: u8 = 32;

/// Blink duty for the active-high analog modes (complement of [`ACK_INTENSITY`]).
const ACK_INTENSITY_INVERTED: u8 = !ACK_INTENSITY;

/// Duration of the acknowledgment flash.
pub const ACK_FLASH_MS: u32 = 10;

/// How the device drives its outputs.
#[derive(Clone, Copy, Debug, Default, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Mode {
    /// Analog RGB through PWM.
    #[default]
    Analog = 0,
    /// Analog RGB with complemented duty cycles (active-low LEDs).
    AnalogInverted = 1,
    /// Pixel-protocol output only; the analog clocks are stopped.
    PixelSerial = 2,
    /// Pixel-protocol output with the analog outputs left running.
    PixelSerialWithAnalog = 3,
}

impl Mode {
    /// Decode a persisted or received mode byte; unknown values become [`Mode::Analog`].
    #[must_use]
    pub const fn from_stored(byte: u8) -> Self {
        match byte {
            1 => Self::AnalogInverted,
            2 => Self::PixelSerial,
            3 => Self::PixelSerialWithAnalog,
            _ => Self::Analog,
        }
    }

    /// Whether the mode drives the pixel-protocol outputs.
    #[must_use]
    pub const fn uses_pixels(self) -> bool {
        matches!(self, Self::PixelSerial | Self::PixelSerialWithAnalog)
    }

    /// Whether the mode drives the analog outputs.
    #[must_use]
    pub const fn uses_analog(self) -> bool {
        !matches!(self, Self::PixelSerial)
    }
}

impl From<Mode> for u8 {
    fn from(mode: Mode) -> Self {
        mode as Self
    }
}

/// Put the outputs into `mode`, with a short user-visible acknowledgment.
///
/// In order:
/// 1. [`Mode::PixelSerial`]: switch the analog outputs off and stop their clock.
/// 2. Pixel modes: flash one dim white pixel on every pixel output, then black.
/// 3. Analog modes: start the clock, blink the analog outputs dim, then settle off.
///    [`Mode::Analog`] is active-low (off = duty 255); the other analog modes settle
///    at duty 0.
///
/// Runs to completion; callers disable interrupts around it, so its duration is
/// bounded by the two [`ACK_FLASH_MS`] delays.
pub fn apply_mode<C, K, P, D>(
    mode: Mode,
    analog: &mut PwmColor<C, K>,
    pixels: &mut P,
    delay: &mut D,
) where
    C: ColorChannel,
    K: PwmClock,
    P: PixelTransmitter,
    D: DelayNs,
{
    info!("Applying mode {}", mode);

    if mode == Mode::PixelSerial {
        analog.set(0, 0, 0);
        analog.stop_clock();
    }

    if mode.uses_pixels() {
        flash_pixels(pixels, [ACK_INTENSITY; BYTES_PER_PIXEL]);
        delay.delay_ms(ACK_FLASH_MS);
        flash_pixels(pixels, [0; BYTES_PER_PIXEL]);
    }

    if mode.uses_analog() {
        analog.start_clock();
        if mode == Mode::Analog {
            analog.set(ACK_INTENSITY, ACK_INTENSITY, ACK_INTENSITY);
            delay.delay_ms(ACK_FLASH_MS);
            analog.set(u8::MAX, u8::MAX, u8::MAX);
        } else {
            analog.set(
                ACK_INTENSITY_INVERTED,
                ACK_INTENSITY_INVERTED,
                ACK_INTENSITY_INVERTED,
            );
            delay.delay_ms(ACK_FLASH_MS);
            analog.set(0, 0, 0);
        }
    }
}

// A scratch pixel keeps the LED buffer untouched by the acknowledgment.
fn flash_pixels<P: PixelTransmitter>(pixels: &mut P, pixel: [u8; BYTES_PER_PIXEL]) {
    for channel in PixelChannel::ALL {
        pixels.send(&pixel, channel);
    }
}
