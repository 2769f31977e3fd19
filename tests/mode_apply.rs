#![allow(missing_docs)]
use blinkstick_envoy::config_store::{ConfigStore, RamConfigStore};
use blinkstick_envoy::mode::{ACK_FLASH_MS, ACK_INTENSITY, Mode, apply_mode};
use blinkstick_envoy::pixel::PixelChannel;
use blinkstick_envoy::sim::{self, SimEvent, SimLog};
use smart_leds::RGB8;

fn set_events(duty: u8) -> Vec<SimEvent> {
    (0..3)
        .flat_map(|channel| {
            if duty == 0 {
                vec![SimEvent::Disconnect(channel)]
            } else {
                vec![SimEvent::Connect(channel), SimEvent::SetDuty(channel, duty)]
            }
        })
        .collect()
}

fn flash_events(intensity: u8) -> Vec<SimEvent> {
    PixelChannel::ALL
        .into_iter()
        .map(|channel| SimEvent::Send {
            channel,
            bytes: vec![intensity; 3],
        })
        .collect()
}

fn apply(mode: Mode) -> Vec<SimEvent> {
    let log = SimLog::default();
    let mut analog = sim::pwm_color(&log);
    let mut pixels = sim::pixels(&log);
    let mut delay = sim::delay(&log);

    apply_mode(mode, &mut analog, &mut pixels, &mut delay);

    log.events()
}

#[test]
fn analog_blinks_dim_then_settles_at_full_duty() {
    let mut expected = vec![SimEvent::ClockStart];
    expected.extend(set_events(ACK_INTENSITY));
    expected.push(SimEvent::DelayMs(ACK_FLASH_MS));
    expected.extend(set_events(u8::MAX));

    assert_eq!(apply(Mode::Analog), expected);
}

#[test]
fn analog_inverted_blinks_complement_then_settles_at_zero() {
    let mut expected = vec![SimEvent::ClockStart];
    expected.extend(set_events(!ACK_INTENSITY));
    expected.push(SimEvent::DelayMs(ACK_FLASH_MS));
    expected.extend(set_events(0));

    assert_eq!(apply(Mode::AnalogInverted), expected);
}

#[test]
fn pixel_serial_stops_analog_then_flashes_every_output() {
    let mut expected = set_events(0);
    expected.push(SimEvent::ClockStop);
    expected.extend(flash_events(ACK_INTENSITY));
    expected.push(SimEvent::DelayMs(ACK_FLASH_MS));
    expected.extend(flash_events(0));

    let events = apply(Mode::PixelSerial);

    assert_eq!(events, expected);
    assert!(!events.contains(&SimEvent::ClockStart));
}

#[test]
fn pixel_serial_with_analog_flashes_pixels_then_analog() {
    let mut expected = flash_events(ACK_INTENSITY);
    expected.push(SimEvent::DelayMs(ACK_FLASH_MS));
    expected.extend(flash_events(0));
    expected.push(SimEvent::ClockStart);
    expected.extend(set_events(!ACK_INTENSITY));
    expected.push(SimEvent::DelayMs(ACK_FLASH_MS));
    expected.extend(set_events(0));

    assert_eq!(apply(Mode::PixelSerialWithAnalog), expected);
}

#[test]
fn start_applies_persisted_mode() {
    let mut store = RamConfigStore::new();
    store.persist_mode(Mode::PixelSerial).unwrap();
    let (mut controller, log) = sim::controller(store);

    controller.start();

    assert_eq!(controller.state().mode(), Mode::PixelSerial);
    assert!(log.events().contains(&SimEvent::ClockStop));
    assert_eq!(log.sends().len(), 6);
    assert!(!controller.analog().clock().is_running());
}

#[test]
fn acknowledgment_flash_leaves_led_buffer_alone() {
    let (mut controller, _log) = sim::controller(RamConfigStore::new());
    controller.set_report(&[5, 0, 0, 1, 2, 3]);
    run_until_idle(&mut controller);
    let before = controller.state().leds().clone();

    controller.set_report(&[4, 3]);
    run_until_idle(&mut controller);

    assert_eq!(controller.state().leds(), &before);
    assert_eq!(controller.state().leds().pixel(0), Some(RGB8::new(2, 1, 3)));
}

fn run_until_idle(controller: &mut blinkstick_envoy::controller::Controller<sim::SimBoard>) {
    for _ in 0..1_000 {
        if controller.state().task().is_idle() {
            return;
        }
        controller.poll();
    }
    panic!("deferred task never finished");
}
