#![allow(missing_docs)]
use blinkstick_envoy::config_store::RamConfigStore;
use blinkstick_envoy::controller::Controller;
use blinkstick_envoy::pixel::{BYTES_PER_PIXEL, MAX_LEDS, PixelChannel};
use blinkstick_envoy::report::ReportId;
use blinkstick_envoy::scheduler::{DeferredTask, SETTLE_CYCLES, SLICE_PIXELS};
use blinkstick_envoy::sim::{self, SimBoard, SimEvent, SimLog};

fn idle_controller() -> (Controller<SimBoard>, SimLog) {
    sim::controller(RamConfigStore::new())
}

fn frame(report: ReportId, channel: u8) -> Vec<u8> {
    let mut bytes = vec![report.id(), channel];
    bytes.extend((1..report.payload_len()).map(|i| i as u8));
    bytes
}

#[test]
fn idle_poll_only_feeds_watchdog() {
    let (mut controller, log) = idle_controller();

    controller.poll();
    controller.poll();

    assert_eq!(log.events(), [SimEvent::Feed, SimEvent::Feed]);
}

#[test]
fn pixel_task_settles_then_sends_and_resumes() {
    let (mut controller, log) = idle_controller();
    controller.set_report(&frame(ReportId::Frame8, 1));
    assert_eq!(log.events(), [SimEvent::Suspend]);
    log.clear();

    for _ in 0..SETTLE_CYCLES {
        controller.poll();
    }
    assert!(log.sends().is_empty());
    assert!(controller.usb().is_suspended());

    controller.poll();

    assert!(controller.state().task().is_idle());
    assert!(!controller.usb().is_suspended());
    let sends = log.sends();
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].0, PixelChannel::from_wire(1));
    assert_eq!(sends[0].1.len(), 8 * BYTES_PER_PIXEL);
    assert_eq!(log.events().last(), Some(&SimEvent::Resume));
}

#[test]
fn every_task_finishes_within_bounded_ticks() {
    let reports: [&[u8]; 6] = [
        &[4, 1],
        &[5, 0, 63, 1, 2, 3],
        &frame(ReportId::Frame8, 0),
        &frame(ReportId::Frame16, 1),
        &frame(ReportId::Frame32, 2),
        &frame(ReportId::Frame64, 0),
    ];
    let bound = usize::from(SETTLE_CYCLES) + MAX_LEDS.div_ceil(SLICE_PIXELS);

    for report in reports {
        let (mut controller, log) = idle_controller();
        controller.set_report(report);
        assert!(!controller.state().task().is_idle());

        let mut ticks = 0;
        while !controller.state().task().is_idle() {
            controller.poll();
            ticks += 1;
            assert!(ticks <= bound, "report {} exceeded {bound} ticks", report[0]);
        }

        assert!(!controller.usb().is_suspended());
        let events = log.events();
        let suspends = events.iter().filter(|e| **e == SimEvent::Suspend).count();
        let resumes = events.iter().filter(|e| **e == SimEvent::Resume).count();
        assert_eq!((suspends, resumes), (1, 1), "report {}", report[0]);
    }
}

#[test]
fn watchdog_is_fed_every_tick_of_a_task() {
    let (mut controller, log) = idle_controller();
    controller.set_report(&frame(ReportId::Frame64, 0));

    let mut ticks = 0;
    while !controller.state().task().is_idle() {
        controller.poll();
        ticks += 1;
    }

    let feeds = log.events().iter().filter(|e| **e == SimEvent::Feed).count();
    assert_eq!(feeds, ticks);
}

#[test]
fn indexed_pixel_sends_prefix_through_that_pixel() {
    let (mut controller, log) = idle_controller();
    controller.set_report(&[5, 0, 3, 10, 20, 30]);

    while !controller.state().task().is_idle() {
        controller.poll();
    }

    let sends = log.sends();
    assert_eq!(sends.len(), 1);
    let (channel, bytes) = &sends[0];
    assert_eq!(*channel, PixelChannel::from_wire(0));
    assert_eq!(bytes.len(), 4 * BYTES_PER_PIXEL);
    assert_eq!(&bytes[9..], &[10, 20, 30]);
}

#[test]
fn apply_mode_task_runs_acknowledgment_once() {
    let (mut controller, log) = idle_controller();
    controller.set_report(&[4, 0]);
    log.clear();

    while !controller.state().task().is_idle() {
        controller.poll();
    }

    let events = log.events();
    let starts = events.iter().filter(|e| **e == SimEvent::ClockStart).count();
    assert_eq!(starts, 1);
    assert_eq!(events.last(), Some(&SimEvent::Resume));
}

#[test]
fn settle_counter_advances_one_per_tick() {
    let (mut controller, _log) = idle_controller();
    controller.set_report(&[4, 3]);

    controller.poll();
    controller.poll();

    assert_eq!(
        controller.state().task(),
        DeferredTask::ApplyMode { delay_cycles: 2 }
    );
}
