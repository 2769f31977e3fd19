#![cfg(feature = "host")]
//! Host-side board: every capability records what it is asked to do into one shared,
//! ordered [`SimLog`], so tests can assert on register-write ordering and on the
//! bytes a pixel output would have shifted out.

use core::cell::RefCell;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::Result;
use crate::config_store::{CONFIG_STORE_LEN, ConfigStore, RamConfigStore};
use crate::controller::{Board, Controller, UsbControl, Watchdog};
use crate::pixel::{PixelChannel, PixelTransmitter};
use crate::pwm_color::{ColorChannel, PwmClock, PwmColor};

/// One recorded capability call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SimEvent {
    /// Analog channel `0..3` (red, green, blue) attached to its pin.
    Connect(usize),
    /// Analog channel detached.
    Disconnect(usize),
    /// Analog duty register written.
    SetDuty(usize, u8),
    /// Analog clock started.
    ClockStart,
    /// Analog clock stopped.
    ClockStop,
    /// Pixel bytes shifted out.
    Send {
        /// Output driven.
        channel: PixelChannel,
        /// Wire-order bytes.
        bytes: Vec<u8>,
    },
    /// USB engine told to refuse new transactions.
    Suspend,
    /// USB engine told to accept transactions again.
    Resume,
    /// Blocking delay, in milliseconds.
    DelayMs(u32),
    /// Blocking delay, in nanoseconds.
    DelayNs(u32),
    /// Watchdog fed.
    Feed,
    /// Buffered store writes committed to the medium.
    Flush,
}

/// Shared, ordered record of [`SimEvent`]s.
#[derive(Clone, Debug, Default)]
pub struct SimLog(Rc<RefCell<Vec<SimEvent>>>);

impl SimLog {
    fn push(&self, event: SimEvent) {
        self.0.borrow_mut().push(event);
    }

    /// Everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<SimEvent> {
        self.0.borrow().clone()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    /// Just the pixel transmissions, in order.
    #[must_use]
    pub fn sends(&self) -> Vec<(PixelChannel, Vec<u8>)> {
        self.0
            .borrow()
            .iter()
            .filter_map(|event| match event {
                SimEvent::Send { channel, bytes } => Some((*channel, bytes.clone())),
                _ => None,
            })
            .collect()
    }
}

/// Analog channel double; tracks its pin attachment and duty register.
#[derive(Debug)]
pub struct SimChannel {
    index: usize,
    connected: bool,
    duty: u8,
    log: SimLog,
}

impl SimChannel {
    /// Whether the output-compare unit drives the pin.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Current duty register value.
    #[must_use]
    pub const fn duty(&self) -> u8 {
        self.duty
    }
}

impl ColorChannel for SimChannel {
    fn connect(&mut self) {
        self.connected = true;
        self.log.push(SimEvent::Connect(self.index));
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.log.push(SimEvent::Disconnect(self.index));
    }

    fn set_duty(&mut self, duty: u8) {
        self.duty = duty;
        self.log.push(SimEvent::SetDuty(self.index, duty));
    }
}

/// Analog clock double.
#[derive(Debug)]
pub struct SimClock {
    running: bool,
    log: SimLog,
}

impl SimClock {
    /// Whether the counters are running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }
}

impl PwmClock for SimClock {
    fn start(&mut self) {
        self.running = true;
        self.log.push(SimEvent::ClockStart);
    }

    fn stop(&mut self) {
        self.running = false;
        self.log.push(SimEvent::ClockStop);
    }
}

/// Pixel output double.
#[derive(Debug)]
pub struct SimPixels {
    log: SimLog,
}

impl PixelTransmitter for SimPixels {
    fn send(&mut self, bytes: &[u8], channel: PixelChannel) {
        self.log.push(SimEvent::Send {
            channel,
            bytes: bytes.to_vec(),
        });
    }
}

/// USB flow-control double.
#[derive(Debug)]
pub struct SimUsb {
    suspended: bool,
    log: SimLog,
}

impl SimUsb {
    /// Whether new transactions are currently refused.
    #[must_use]
    pub const fn is_suspended(&self) -> bool {
        self.suspended
    }
}

impl UsbControl for SimUsb {
    fn suspend_new_transactions(&mut self) {
        self.suspended = true;
        self.log.push(SimEvent::Suspend);
    }

    fn resume_new_transactions(&mut self) {
        self.suspended = false;
        self.log.push(SimEvent::Resume);
    }
}

/// Delay double; returns immediately.
#[derive(Debug)]
pub struct SimDelay {
    log: SimLog,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.log.push(SimEvent::DelayNs(ns));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.log.push(SimEvent::DelayMs(ms));
    }
}

/// Watchdog double.
#[derive(Debug)]
pub struct SimWatchdog {
    log: SimLog,
}

impl Watchdog for SimWatchdog {
    fn feed(&mut self) {
        self.log.push(SimEvent::Feed);
    }
}

/// Configuration store double: a [`RamConfigStore`] that records each flush.
#[derive(Debug)]
pub struct SimStore {
    store: RamConfigStore,
    log: SimLog,
}

impl SimStore {
    /// The raw bytes, as a power cycle would reload them.
    #[must_use]
    pub const fn image(&self) -> &[u8; CONFIG_STORE_LEN] {
        self.store.image()
    }
}

impl ConfigStore for SimStore {
    fn read(&mut self, offset: usize, buffer: &mut [u8]) -> Result<()> {
        self.store.read(offset, buffer)
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.store.write(offset, bytes)
    }

    fn flush(&mut self) -> Result<()> {
        self.log.push(SimEvent::Flush);
        self.store.flush()
    }
}

/// The host board.
#[derive(Debug)]
pub enum SimBoard {}

impl Board for SimBoard {
    type Store = SimStore;
    type Channel = SimChannel;
    type Clock = SimClock;
    type Pixels = SimPixels;
    type Usb = SimUsb;
    type Delay = SimDelay;
    type Watchdog = SimWatchdog;
}

/// An analog driver whose channels and clock record into `log`.
#[must_use]
pub fn pwm_color(log: &SimLog) -> PwmColor<SimChannel, SimClock> {
    let channel = |index| SimChannel {
        index,
        connected: false,
        duty: 0,
        log: log.clone(),
    };
    PwmColor::new(
        channel(0),
        channel(1),
        channel(2),
        SimClock {
            running: false,
            log: log.clone(),
        },
    )
}

/// A pixel output that records into `log`.
#[must_use]
pub fn pixels(log: &SimLog) -> SimPixels {
    SimPixels { log: log.clone() }
}

/// A delay that records into `log`.
#[must_use]
pub fn delay(log: &SimLog) -> SimDelay {
    SimDelay { log: log.clone() }
}

/// A controller over `store`, not yet started, plus the log all its capabilities share.
#[must_use]
pub fn controller(store: RamConfigStore) -> (Controller<SimBoard>, SimLog) {
    let log = SimLog::default();
    let controller = Controller::new(
        SimStore {
            store,
            log: log.clone(),
        },
        pwm_color(&log),
        pixels(&log),
        SimUsb {
            suspended: false,
            log: log.clone(),
        },
        delay(&log),
        SimWatchdog { log: log.clone() },
    );
    (controller, log)
}
