//! Deferred work driven from the main loop.
//!
//! A completed write may leave work that is too slow to do inside the USB
//! callback: streaming pixels or re-applying the mode. That work is recorded as a
//! [`DeferredTask`] and advanced by one bounded step per main-loop iteration. While a
//! task is in flight the USB engine accepts no new transactions.

use crate::controller::{Board, Controller, UsbControl};
use crate::mode::apply_mode;
use crate::pixel::{PixelChannel, send_pixels};

/// Idle iterations a task waits before doing any work, so the USB status stage of
/// the write that armed it completes first.
pub const SETTLE_CYCLES: u16 = 64;

/// Most pixels sent per main-loop iteration.
pub const SLICE_PIXELS: usize = 64;

/// Work pending for the main loop.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeferredTask {
    /// Nothing to do.
    #[default]
    None,
    /// Stream pixels `led_index..led_count` of the LED buffer out on `channel`.
    SendPixelData {
        /// Output to drive.
        channel: PixelChannel,
        /// Pixels to send in total.
        led_count: usize,
        /// Next pixel to send.
        led_index: usize,
        /// Settle iterations elapsed.
        delay_cycles: u16,
    },
    /// Re-apply the current mode.
    ApplyMode {
        /// Settle iterations elapsed.
        delay_cycles: u16,
    },
}

impl DeferredTask {
    /// A fresh pixel stream of `led_count` pixels.
    #[must_use]
    pub const fn send_pixel_data(channel: PixelChannel, led_count: usize) -> Self {
        Self::SendPixelData {
            channel,
            led_count,
            led_index: 0,
            delay_cycles: 0,
        }
    }

    /// A fresh mode application.
    #[must_use]
    pub const fn apply_mode() -> Self {
        Self::ApplyMode { delay_cycles: 0 }
    }

    /// Whether nothing is pending.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::None)
    }

    // Counts one settle iteration; `true` while the task is still settling.
    const fn settle(&mut self) -> bool {
        match self {
            Self::SendPixelData { delay_cycles, .. } | Self::ApplyMode { delay_cycles }
                if *delay_cycles < SETTLE_CYCLES =>
            {
                *delay_cycles += 1;
                true
            }
            _ => false,
        }
    }
}

impl<B: Board> Controller<B> {
    /// Record `task` and stop the USB engine from accepting new transactions.
    pub(crate) fn arm(&mut self, task: DeferredTask) {
        if !self.state.task.is_idle() {
            warn!("Replacing unfinished deferred task");
        }
        debug!("Arming deferred task");
        self.state.task = task;
        self.usb.suspend_new_transactions();
    }

    /// Advance the deferred task by one bounded step.
    ///
    /// A task settles for [`SETTLE_CYCLES`] iterations, then either sends up to
    /// [`SLICE_PIXELS`] pixels with interrupts disabled or applies the mode. When it
    /// finishes, the task returns to [`DeferredTask::None`] and USB transactions
    /// resume.
    pub fn tick_deferred(&mut self) {
        if self.state.task.settle() {
            return;
        }
        match self.state.task {
            DeferredTask::None => {}
            DeferredTask::SendPixelData {
                channel,
                led_count,
                led_index,
                delay_cycles,
            } => {
                let end = led_index.saturating_add(SLICE_PIXELS).min(led_count);
                self.send_slice(channel, led_index, end);
                if end >= led_count {
                    self.finish_task();
                } else {
                    self.state.task = DeferredTask::SendPixelData {
                        channel,
                        led_count,
                        led_index: end,
                        delay_cycles,
                    };
                }
            }
            DeferredTask::ApplyMode { .. } => {
                let mode = self.state.mode;
                critical_section::with(|_| {
                    apply_mode(mode, &mut self.analog, &mut self.pixels, &mut self.delay);
                });
                self.finish_task();
            }
        }
    }

    fn send_slice(&mut self, channel: PixelChannel, start: usize, end: usize) {
        match self.state.leds.pixel_bytes(start, end) {
            Some(bytes) => {
                trace!("Sending pixels {}..{} on channel {}", start, end, channel.index());
                send_pixels(&mut self.pixels, bytes, channel);
            }
            None => warn!("Pixel range {}..{} outside the LED buffer", start, end),
        }
    }

    fn finish_task(&mut self) {
        self.state.task = DeferredTask::None;
        self.usb.resume_new_transactions();
    }
}
