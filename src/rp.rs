//! RP2040 (Pico 1) board binding.
//!
//! # Pins
//!
//! | Function          | GPIO | Peripheral   |
//! |-------------------|------|--------------|
//! | Red               | 0    | PWM slice 0A |
//! | Green             | 2    | PWM slice 1A |
//! | Blue              | 4    | PWM slice 2A |
//! | Pixel output 0    | 6    | PIO0 SM0     |
//! | Pixel output 1    | 7    | PIO0 SM1     |
//! | Pixel output 2    | 8    | PIO0 SM2     |
//!
//! The configuration store lives in the last 4 KB flash sector, which `memory-pico1.x`
//! keeps out of the firmware image.

pub mod flash_store;
pub mod pixel_output;
pub mod pwm_channel;
pub mod usb_hid;

use core::cell::RefCell;

use embassy_rp::Peri;
use embassy_rp::peripherals::WATCHDOG;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_time::{Delay, Duration};

use crate::controller::{Board, Controller, Watchdog};
use flash_store::FlashConfigStore;
use pixel_output::RpPixelOutput;
use pwm_channel::{RpColorChannel, RpPwmClock};
use usb_hid::UsbGate;

/// Watchdog period; the main loop must feed it faster than this.
pub const WATCHDOG_PERIOD: Duration = Duration::from_secs(1);

/// The Pico 1 board.
pub enum RpBoard {}

impl Board for RpBoard {
    type Store = FlashConfigStore;
    type Channel = RpColorChannel;
    type Clock = RpPwmClock;
    type Pixels = RpPixelOutput;
    type Usb = UsbGate;
    type Delay = Delay;
    type Watchdog = RpWatchdog;
}

/// The hardware watchdog, started with [`WATCHDOG_PERIOD`].
pub struct RpWatchdog(embassy_rp::watchdog::Watchdog);

impl RpWatchdog {
    /// Start the watchdog.
    #[must_use]
    pub fn start(peripheral: Peri<'static, WATCHDOG>) -> Self {
        let mut watchdog = embassy_rp::watchdog::Watchdog::new(peripheral);
        watchdog.start(WATCHDOG_PERIOD);
        info!("Watchdog started ({} ms)", WATCHDOG_PERIOD.as_millis());
        Self(watchdog)
    }
}

impl Watchdog for RpWatchdog {
    fn feed(&mut self) {
        self.0.feed();
    }
}

/// The controller, shared by the USB request handler and the main loop.
///
/// Both run on the thread-mode executor, so neither can preempt the other.
pub struct SharedController {
    controller: Mutex<ThreadModeRawMutex, RefCell<Option<Controller<RpBoard>>>>,
}

impl SharedController {
    /// An empty slot; [`install`](Self::install) fills it.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            controller: Mutex::new(RefCell::new(None)),
        }
    }

    /// Hand the controller over.
    pub fn install(&self, controller: Controller<RpBoard>) {
        self.controller.lock(|slot| {
            slot.replace(Some(controller));
        });
    }

    /// Run `f` on the controller; `None` if it is not installed yet.
    pub fn with<R>(&self, f: impl FnOnce(&mut Controller<RpBoard>) -> R) -> Option<R> {
        self.controller
            .lock(|slot| slot.borrow_mut().as_mut().map(f))
    }
}

impl Default for SharedController {
    fn default() -> Self {
        Self::new()
    }
}
