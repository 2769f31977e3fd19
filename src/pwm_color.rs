//! A device abstraction for three-channel analog (PWM) RGB output.
//!
//! See [`PwmColor`] for the glitch-free write ordering.

/// One PWM output channel: an output-compare unit that can be attached to its pin.
///
/// Implemented per target; the RP2040 binding lives in `rp::pwm_channel`.
pub trait ColorChannel {
    /// Attach the output-compare unit to the pin so it drives the current duty.
    fn connect(&mut self);

    /// Detach the output-compare unit; the pin idles low.
    fn disconnect(&mut self);

    /// Write the duty register (0–255).
    fn set_duty(&mut self, duty: u8);
}

/// The clock source shared by the three analog channels.
pub trait PwmClock {
    /// Start the counters; connected channels begin toggling.
    fn start(&mut self);

    /// Stop the counters; every channel idles.
    fn stop(&mut self);
}

/// Three independent [`ColorChannel`]s plus their shared [`PwmClock`].
///
/// Writing a non-zero duty while a pin is toggling at a stale duty can show a visible
/// glitch, so [`set`](Self::set) orders register writes per channel:
///
/// - duty `0`: disconnect the channel and leave the duty register untouched;
/// - duty `1..=255`: connect the channel, then write the duty register.
///
/// Channels are handled independently; one channel's state never delays another.
pub struct PwmColor<C, K> {
    red: C,
    green: C,
    blue: C,
    clock: K,
}

impl<C: ColorChannel, K: PwmClock> PwmColor<C, K> {
    /// Bundle three channels and their clock.
    pub const fn new(red: C, green: C, blue: C, clock: K) -> Self {
        Self {
            red,
            green,
            blue,
            clock,
        }
    }

    /// Set the three duty cycles.
    pub fn set(&mut self, red: u8, green: u8, blue: u8) {
        trace!("PWM set r={} g={} b={}", red, green, blue);
        write_channel(&mut self.red, red);
        write_channel(&mut self.green, green);
        write_channel(&mut self.blue, blue);
    }

    /// Start the shared clock source.
    ///
    /// Only the mode-apply procedure changes clock enablement.
    pub(crate) fn start_clock(&mut self) {
        self.clock.start();
    }

    /// Stop the shared clock source.
    pub(crate) fn stop_clock(&mut self) {
        self.clock.stop();
    }

    /// The red, green and blue channels, in that order.
    pub const fn channels(&self) -> [&C; 3] {
        [&self.red, &self.green, &self.blue]
    }

    /// The shared clock.
    pub const fn clock(&self) -> &K {
        &self.clock
    }
}

fn write_channel<C: ColorChannel>(channel: &mut C, duty: u8) {
    if duty == 0 {
        channel.disconnect();
    } else {
        channel.connect();
        channel.set_duty(duty);
    }
}
