//! The single owned device-state object and the cooperative main-loop entry points.
//!
//! A [`Controller`] owns the LED buffer, the analog color, the current [`Mode`], the
//! [`TransferCursor`] and the [`DeferredTask`], together with one implementation of
//! every board capability named by a [`Board`]. The USB engine calls into the report
//! transfer engine (`transfer`), and the main loop calls [`Controller::poll`] once
//! per iteration.

use embedded_hal::delay::DelayNs;
use smart_leds::RGB8;

use crate::config_store::ConfigStore;
use crate::mode::{Mode, apply_mode};
use crate::pixel::{LedBuffer, PixelTransmitter};
use crate::pwm_color::{ColorChannel, PwmClock, PwmColor};
use crate::report::TransferCursor;
use crate::scheduler::DeferredTask;

/// Flow control offered by the external USB engine.
pub trait UsbControl {
    /// Stop accepting new host transactions (in-flight status stages still complete).
    fn suspend_new_transactions(&mut self);

    /// Accept host transactions again.
    fn resume_new_transactions(&mut self);
}

/// The external watchdog; it resets the device unless fed every loop iteration.
pub trait Watchdog {
    /// Clear the watchdog timer.
    fn feed(&mut self);
}

/// Names one implementation of each capability the controller drives.
pub trait Board {
    /// Persistent configuration region.
    type Store: ConfigStore;
    /// One analog output channel (used for red, green and blue).
    type Channel: ColorChannel;
    /// Clock shared by the analog channels.
    type Clock: PwmClock;
    /// Pixel-protocol signal generator.
    type Pixels: PixelTransmitter;
    /// USB engine flow control.
    type Usb: UsbControl;
    /// Blocking delay used by the mode acknowledgment.
    type Delay: DelayNs;
    /// Loop watchdog.
    type Watchdog: Watchdog;
}

/// Device state shared by the transfer engine and the deferred scheduler.
#[derive(Clone, Debug, Default)]
pub struct DeviceState {
    pub(crate) leds: LedBuffer,
    pub(crate) rgb: RGB8,
    pub(crate) mode: Mode,
    pub(crate) cursor: TransferCursor,
    pub(crate) task: DeferredTask,
}

impl DeviceState {
    /// Pixel data, in wire order.
    #[must_use]
    pub const fn leds(&self) -> &LedBuffer {
        &self.leds
    }

    /// The last analog color written by the host (before any inversion).
    #[must_use]
    pub const fn rgb(&self) -> RGB8 {
        self.rgb
    }

    /// The current operating mode.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// The active transfer cursor.
    #[must_use]
    pub const fn cursor(&self) -> &TransferCursor {
        &self.cursor
    }

    /// The deferred task in flight, or [`DeferredTask::None`].
    #[must_use]
    pub const fn task(&self) -> DeferredTask {
        self.task
    }
}

/// The device controller. See the [module documentation](self).
pub struct Controller<B: Board> {
    pub(crate) state: DeviceState,
    pub(crate) store: B::Store,
    pub(crate) analog: PwmColor<B::Channel, B::Clock>,
    pub(crate) pixels: B::Pixels,
    pub(crate) usb: B::Usb,
    pub(crate) delay: B::Delay,
    pub(crate) watchdog: B::Watchdog,
}

impl<B: Board> Controller<B> {
    /// Build a controller, loading the persisted mode (unknown values become
    /// [`Mode::Analog`]). No output is touched until [`start`](Self::start).
    pub fn new(
        mut store: B::Store,
        analog: PwmColor<B::Channel, B::Clock>,
        pixels: B::Pixels,
        usb: B::Usb,
        delay: B::Delay,
        watchdog: B::Watchdog,
    ) -> Self {
        let mode = store.load_mode();
        info!("Controller: persisted mode {}", mode);
        Self {
            state: DeviceState {
                mode,
                ..DeviceState::default()
            },
            store,
            analog,
            pixels,
            usb,
            delay,
            watchdog,
        }
    }

    /// Power-on: apply the persisted mode once, with interrupts disabled.
    pub fn start(&mut self) {
        let mode = self.state.mode;
        critical_section::with(|_| {
            apply_mode(mode, &mut self.analog, &mut self.pixels, &mut self.delay);
        });
    }

    /// One main-loop iteration: feed the watchdog, then advance the deferred task.
    ///
    /// The USB engine is serviced by the caller between iterations.
    pub fn poll(&mut self) {
        self.watchdog.feed();
        self.tick_deferred();
    }

    /// Device state, for inspection.
    #[must_use]
    pub const fn state(&self) -> &DeviceState {
        &self.state
    }

    /// The configuration store.
    #[must_use]
    pub const fn store(&self) -> &B::Store {
        &self.store
    }

    /// Mutable access to the configuration store (e.g. to read the serial number).
    pub const fn store_mut(&mut self) -> &mut B::Store {
        &mut self.store
    }

    /// The analog driver.
    #[must_use]
    pub const fn analog(&self) -> &PwmColor<B::Channel, B::Clock> {
        &self.analog
    }

    /// The USB flow-control capability.
    #[must_use]
    pub const fn usb(&self) -> &B::Usb {
        &self.usb
    }
}
