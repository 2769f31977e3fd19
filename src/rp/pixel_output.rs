//! Pixel-protocol output on three pins, clocked out by PIO0 state machines 0 to 2.
//!
//! One WS2812 program is loaded and shared by all three state machines. Each pixel is
//! pushed into the TX FIFO as one 24-bit word in wire order, MSB first. The caller
//! holds interrupts off for the whole call, so the push spins on a full FIFO instead of
//! waiting on DMA.

use embassy_rp::Peri;
use embassy_rp::bind_interrupts;
use embassy_rp::clocks::clk_sys_freq;
use embassy_rp::peripherals::PIO0;
use embassy_rp::pio::{
    Common, Config, FifoJoin, InterruptHandler, LoadedProgram, Pio, PioPin, ShiftConfig,
    ShiftDirection, StateMachine,
};
use embassy_time::{Duration, block_for};
use fixed::types::U24F8;

use crate::pixel::{BYTES_PER_PIXEL, PixelChannel, PixelTransmitter};

// PIO cycles per bit: start, data, stop.
const T1: u8 = 2;
const T2: u8 = 5;
const T3: u8 = 3;
const CYCLES_PER_BIT: u32 = (T1 + T2 + T3) as u32;
const BIT_RATE_KHZ: u32 = 800;

// The last word still shifting out of the OSR once the FIFO drains.
const LAST_PIXEL_US: u64 = 30;
// Latch: the line must stay low this long before the strip shows a new frame.
const RESET_US: u64 = 60;

#[allow(unsafe_code, reason = "interrupt vector generated by bind_interrupts!")]
mod irqs {
    use super::{InterruptHandler, PIO0, bind_interrupts};

    bind_interrupts!(pub(super) struct Irqs {
        PIO0_IRQ_0 => InterruptHandler<PIO0>;
    });
}

/// Three pixel outputs, one PIO state machine each.
pub struct RpPixelOutput {
    // Dropping `Common` tears the PIO block down.
    _common: Common<'static, PIO0>,
    sm0: StateMachine<'static, PIO0, 0>,
    sm1: StateMachine<'static, PIO0, 1>,
    sm2: StateMachine<'static, PIO0, 2>,
}

impl RpPixelOutput {
    /// Take PIO0 and three pins (outputs 0, 1 and 2).
    #[must_use]
    pub fn new(
        pio: Peri<'static, PIO0>,
        pin0: Peri<'static, impl PioPin>,
        pin1: Peri<'static, impl PioPin>,
        pin2: Peri<'static, impl PioPin>,
    ) -> Self {
        let Pio {
            mut common,
            mut sm0,
            mut sm1,
            mut sm2,
            ..
        } = Pio::new(pio, irqs::Irqs);
        let program = load_program(&mut common);
        configure(&mut common, &mut sm0, pin0, &program);
        configure(&mut common, &mut sm1, pin1, &program);
        configure(&mut common, &mut sm2, pin2, &program);
        info!("Pixel output on PIO0, clk={}Hz", clk_sys_freq());
        Self {
            _common: common,
            sm0,
            sm1,
            sm2,
        }
    }
}

impl PixelTransmitter for RpPixelOutput {
    fn send(&mut self, bytes: &[u8], channel: PixelChannel) {
        match channel.index() {
            0 => push_blocking(&mut self.sm0, bytes),
            1 => push_blocking(&mut self.sm1, bytes),
            _ => push_blocking(&mut self.sm2, bytes),
        }
    }
}

// side-set 1 bit: the pin follows the waveform, `out x, 1` picks the data bit.
fn load_program(common: &mut Common<'static, PIO0>) -> LoadedProgram<'static, PIO0> {
    let side_set = pio::SideSet::new(false, 1, false);
    let mut a: pio::Assembler<32> = pio::Assembler::new_with_side_set(side_set);

    let mut wrap_target = a.label();
    let mut wrap_source = a.label();
    let mut do_zero = a.label();
    a.set_with_side_set(pio::SetDestination::PINDIRS, 1, 0);
    a.bind(&mut wrap_target);
    a.out_with_delay_and_side_set(pio::OutDestination::X, 1, T3 - 1, 0);
    a.jmp_with_delay_and_side_set(pio::JmpCondition::XIsZero, &mut do_zero, T1 - 1, 1);
    a.jmp_with_delay_and_side_set(pio::JmpCondition::Always, &mut wrap_target, T2 - 1, 1);
    a.bind(&mut do_zero);
    a.nop_with_delay_and_side_set(T2 - 1, 0);
    a.bind(&mut wrap_source);

    common.load_program(&a.assemble_with_wrap(wrap_source, wrap_target))
}

fn configure<const SM: usize>(
    common: &mut Common<'static, PIO0>,
    sm: &mut StateMachine<'static, PIO0, SM>,
    pin: Peri<'static, impl PioPin>,
    program: &LoadedProgram<'static, PIO0>,
) {
    let mut cfg = Config::default();
    let out_pin = common.make_pio_pin(pin);
    cfg.set_out_pins(&[&out_pin]);
    cfg.set_set_pins(&[&out_pin]);
    cfg.use_program(program, &[&out_pin]);

    // Measured in kHz to stay inside U24F8.
    let clock_freq = U24F8::from_num(clk_sys_freq() / 1000);
    cfg.clock_divider = clock_freq / U24F8::from_num(BIT_RATE_KHZ * CYCLES_PER_BIT);

    cfg.fifo_join = FifoJoin::TxOnly;
    cfg.shift_out = ShiftConfig {
        auto_fill: true,
        threshold: 24,
        direction: ShiftDirection::Left,
    };
    sm.set_config(&cfg);
    sm.set_enable(true);
}

fn push_blocking<const SM: usize>(sm: &mut StateMachine<'static, PIO0, SM>, bytes: &[u8]) {
    let tx = sm.tx();
    for pixel in bytes.chunks(BYTES_PER_PIXEL) {
        let word = pack(pixel);
        while !tx.try_push(word) {}
    }
    while !tx.empty() {}
    block_for(Duration::from_micros(LAST_PIXEL_US + RESET_US));
}

/// Pack up to three wire-order bytes into the top 24 bits of a FIFO word.
fn pack(pixel: &[u8]) -> u32 {
    pixel
        .iter()
        .zip([24u32, 16, 8])
        .fold(0, |word, (&byte, shift)| word | (u32::from(byte) << shift))
}
