//! Analog RGB output on three RP2040 PWM slices.
//!
//! Red, green and blue use output A of slices 0, 1 and 2 (GPIO 0, 2 and 4). The three
//! slices sit in one [`PwmBank`] shared by the channels and the clock, so
//! [`PwmClock::stop`] can halt every counter at once.

use core::cell::RefCell;

use embassy_rp::Peri;
use embassy_rp::clocks::clk_sys_freq;
use embassy_rp::peripherals::{PIN_0, PIN_2, PIN_4, PWM_SLICE0, PWM_SLICE1, PWM_SLICE2};
use embassy_rp::pwm::{Config, Pwm};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use static_cell::StaticCell;

use crate::pwm_color::{ColorChannel, PwmClock, PwmColor};

// Compare 255 is past TOP, so duty 255 holds the pin high for the whole period.
const TOP: u16 = 254;

// Carrier frequency for the LEDs; high enough to be flicker-free.
const TARGET_HZ: u32 = 30_000;

const CHANNEL_COUNT: usize = 3;

struct Slice {
    pwm: Pwm<'static>,
    // Kept so every update reapplies the divider and enable bit.
    config: Config,
}

/// The three PWM slices behind the analog outputs.
pub struct PwmBank {
    slices: Mutex<CriticalSectionRawMutex, RefCell<[Slice; CHANNEL_COUNT]>>,
}

impl PwmBank {
    fn with_slice(&self, index: usize, f: impl FnOnce(&mut Slice)) {
        self.slices.lock(|slices| {
            if let Some(slice) = slices.borrow_mut().get_mut(index) {
                f(slice);
            }
        });
    }

    fn set_compare(&self, index: usize, compare: u16) {
        self.with_slice(index, |slice| {
            slice.config.compare_a = compare;
            slice.pwm.set_config(&slice.config);
        });
    }

    fn set_enabled(&self, enabled: bool) {
        self.slices.lock(|slices| {
            for slice in slices.borrow_mut().iter_mut() {
                slice.config.enable = enabled;
                slice.pwm.set_config(&slice.config);
            }
        });
    }
}

/// Static resources for [`PwmBank`].
pub struct PwmBankStatic {
    cell: StaticCell<PwmBank>,
}

impl PwmBankStatic {
    /// Create static resources for the PWM bank.
    #[must_use]
    pub const fn new_static() -> Self {
        Self {
            cell: StaticCell::new(),
        }
    }
}

/// One color channel: an output-compare unit on its own slice.
///
/// The duty register is kept here; "connecting" writes it to the compare register,
/// "disconnecting" forces the compare register to 0 so the pin idles low.
pub struct RpColorChannel {
    bank: &'static PwmBank,
    index: usize,
    duty: u8,
    connected: bool,
}

impl ColorChannel for RpColorChannel {
    fn connect(&mut self) {
        self.connected = true;
        self.bank.set_compare(self.index, u16::from(self.duty));
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.bank.set_compare(self.index, 0);
    }

    fn set_duty(&mut self, duty: u8) {
        self.duty = duty;
        if self.connected {
            self.bank.set_compare(self.index, u16::from(duty));
        }
    }
}

/// Starts and stops the counters of every slice in the bank.
pub struct RpPwmClock {
    bank: &'static PwmBank,
}

impl PwmClock for RpPwmClock {
    fn start(&mut self) {
        self.bank.set_enabled(true);
    }

    fn stop(&mut self) {
        self.bank.set_enabled(false);
    }
}

/// Configure the three slices (counters stopped, outputs low) and bundle them.
pub fn new_pwm_color(
    pwm_bank_static: &'static PwmBankStatic,
    red: (Peri<'static, PWM_SLICE0>, Peri<'static, PIN_0>),
    green: (Peri<'static, PWM_SLICE1>, Peri<'static, PIN_2>),
    blue: (Peri<'static, PWM_SLICE2>, Peri<'static, PIN_4>),
) -> PwmColor<RpColorChannel, RpPwmClock> {
    let clk = clk_sys_freq();
    let period_ticks = TARGET_HZ.saturating_mul(u32::from(TOP) + 1);
    let div_int = (clk / period_ticks).clamp(1, u32::from(u8::MAX));
    info!("PWM clk={}Hz div={} top={}", clk, div_int, TOP);

    let mut config = Config::default();
    config.top = TOP;
    config.compare_a = 0;
    #[expect(
        clippy::cast_possible_truncation,
        reason = "div_int is clamped to the u8 range"
    )]
    let divider = div_int as u8;
    config.divider = divider.into();
    config.enable = false;

    let slices = [
        Slice {
            pwm: Pwm::new_output_a(red.0, red.1, config.clone()),
            config: config.clone(),
        },
        Slice {
            pwm: Pwm::new_output_a(green.0, green.1, config.clone()),
            config: config.clone(),
        },
        Slice {
            pwm: Pwm::new_output_a(blue.0, blue.1, config.clone()),
            config,
        },
    ];
    let bank: &'static PwmBank = pwm_bank_static.cell.init(PwmBank {
        slices: Mutex::new(RefCell::new(slices)),
    });

    let channel = |index| RpColorChannel {
        bank,
        index,
        duty: 0,
        connected: false,
    };
    PwmColor::new(channel(0), channel(1), channel(2), RpPwmClock { bank })
}
