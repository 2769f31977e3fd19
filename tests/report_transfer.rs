#![allow(missing_docs)]
use blinkstick_envoy::config_store::{
    CONFIG_STORE_LEN, ConfigStore, DATA_REGION, ERASED_BYTE, MODE_OFFSET, NAME_REGION,
    RamConfigStore,
};
use blinkstick_envoy::controller::Controller;
use blinkstick_envoy::mode::Mode;
use blinkstick_envoy::pixel::{LED_BUFFER_LEN, PixelChannel};
use blinkstick_envoy::report::{MAX_REPORT_LEN, ReportId, TRANSFER_CHUNK_LEN};
use blinkstick_envoy::scheduler::DeferredTask;
use blinkstick_envoy::sim::{self, SimBoard, SimEvent};
use blinkstick_envoy::transfer::WriteProgress;
use smart_leds::RGB8;

fn controller_in(mode: Mode) -> (Controller<SimBoard>, sim::SimLog) {
    let mut store = RamConfigStore::new();
    store.persist_mode(mode).unwrap();
    let (controller, log) = sim::controller(store);
    (controller, log)
}

fn read(controller: &mut Controller<SimBoard>, report_id: u8) -> Vec<u8> {
    let mut buffer = [0u8; MAX_REPORT_LEN];
    let len = controller.get_report(report_id, &mut buffer);
    buffer[..len].to_vec()
}

fn frame_report(report: ReportId, channel: u8) -> Vec<u8> {
    let mut bytes = vec![report.id(), channel];
    bytes.extend((1..report.payload_len()).map(|i| (i * 7 % 251) as u8));
    bytes
}

fn with_id(report_id: u8, payload: &[u8]) -> Vec<u8> {
    let mut bytes = vec![report_id];
    bytes.extend_from_slice(payload);
    bytes
}

fn run_until_idle(controller: &mut Controller<SimBoard>) -> usize {
    for ticks in 0..10_000 {
        if controller.state().task().is_idle() {
            return ticks;
        }
        controller.poll();
    }
    panic!("deferred task never finished");
}

#[test]
fn color_in_analog_mode_sets_pwm_from_wire_order() {
    let (mut controller, _log) = controller_in(Mode::Analog);

    let progress = controller.set_report(&[1, 0x10, 0x20, 0x30]);

    assert_eq!(progress, WriteProgress::Complete);
    let [red, green, blue] = controller.analog().channels();
    assert_eq!((red.duty(), green.duty(), blue.duty()), (0x20, 0x10, 0x30));
    assert_eq!(controller.state().rgb(), RGB8::new(0x20, 0x10, 0x30));
    assert_eq!(read(&mut controller, 1), [1, 0x10, 0x20, 0x30]);
}

#[test]
fn color_in_inverted_mode_sets_complement() {
    let (mut controller, _log) = controller_in(Mode::AnalogInverted);

    controller.set_report(&[1, 0x10, 0x20, 0x30]);

    let [red, green, blue] = controller.analog().channels();
    assert_eq!((red.duty(), green.duty(), blue.duty()), (0xDF, 0xEF, 0xCF));
    assert_eq!(read(&mut controller, 1), [1, 0x10, 0x20, 0x30]);
}

#[test]
fn color_in_pixel_serial_mode_sends_pixel_zero_inline() {
    let (mut controller, log) = controller_in(Mode::PixelSerial);

    controller.set_report(&[1, 0x10, 0x20, 0x30]);

    assert_eq!(
        log.sends(),
        [(PixelChannel::default(), vec![0x10, 0x20, 0x30])]
    );
    assert_eq!(
        controller.state().leds().pixel(0),
        Some(RGB8::new(0x20, 0x10, 0x30))
    );
    assert!(controller.state().task().is_idle());
    assert!(!controller.usb().is_suspended());
}

#[test]
fn name_and_data_write_through_to_store() {
    let (mut controller, _log) = controller_in(Mode::Analog);
    let name: Vec<u8> = (0..32).map(|i| b'a' + i).collect();
    let data: Vec<u8> = (0..32).map(|i| 200 - i).collect();

    controller.set_report(&with_id(2, &name));
    controller.set_report(&with_id(3, &data));

    let image = controller.store().image();
    assert_eq!(&image[NAME_REGION], name.as_slice());
    assert_eq!(&image[DATA_REGION], data.as_slice());
    assert_eq!(read(&mut controller, 2), with_id(2, &name));
    assert_eq!(read(&mut controller, 3), with_id(3, &data));
}

#[test]
fn mode_write_persists_and_survives_power_cycle() {
    let (mut controller, _log) = controller_in(Mode::Analog);

    controller.set_report(&[4, 2]);

    assert_eq!(controller.state().mode(), Mode::PixelSerial);
    assert_eq!(controller.state().task(), DeferredTask::apply_mode());
    assert!(controller.usb().is_suspended());
    run_until_idle(&mut controller);
    assert_eq!(read(&mut controller, 4), [4, 2]);

    let image = *controller.store().image();
    let (mut rebooted, _log) = sim::controller(RamConfigStore::from_image(image));
    assert_eq!(read(&mut rebooted, 4), [4, 2]);

    let mut corrupted = image;
    corrupted[MODE_OFFSET] = 7;
    let (mut rebooted, _log) = sim::controller(RamConfigStore::from_image(corrupted));
    assert_eq!(read(&mut rebooted, 4), [4, 0]);
}

#[test]
fn invalid_mode_write_is_normalized() {
    let (mut controller, _log) = controller_in(Mode::PixelSerial);

    controller.set_report(&[4, 9]);

    assert_eq!(controller.state().mode(), Mode::Analog);
    assert_eq!(controller.store().image()[MODE_OFFSET], 0);
}

#[test]
fn indexed_pixel_stores_and_arms_prefix() {
    let (mut controller, _log) = controller_in(Mode::PixelSerial);

    controller.set_report(&[5, 0, 3, 10, 20, 30]);

    assert_eq!(
        controller.state().leds().pixel(3),
        Some(RGB8::new(20, 10, 30))
    );
    assert_eq!(
        controller.state().task(),
        DeferredTask::send_pixel_data(PixelChannel::from_wire(0), 4)
    );
    assert!(controller.usb().is_suspended());
}

#[test]
fn indexed_pixel_maps_channels() {
    for (wire, output) in [(0u8, 0usize), (1, 1), (2, 2), (3, 0), (0xFF, 0)] {
        let (mut controller, _log) = controller_in(Mode::PixelSerial);

        controller.set_report(&[5, wire, 0, 1, 1, 1]);

        match controller.state().task() {
            DeferredTask::SendPixelData { channel, .. } => assert_eq!(channel.index(), output),
            other => panic!("unexpected task {other:?}"),
        }
    }
}

#[test]
fn indexed_pixel_out_of_range_is_ignored() {
    let (mut controller, _log) = controller_in(Mode::PixelSerial);

    let progress = controller.set_report(&[5, 0, 64, 1, 2, 3]);

    assert_eq!(progress, WriteProgress::Complete);
    assert!(controller.state().task().is_idle());
    assert_eq!(controller.state().leds().as_bytes(), &[0; LED_BUFFER_LEN]);
    assert!(!controller.usb().is_suspended());
}

#[test]
fn indexed_pixel_reads_pixel_zero() {
    let (mut controller, _log) = controller_in(Mode::PixelSerial);
    controller.set_report(&[5, 2, 0, 7, 8, 9]);
    run_until_idle(&mut controller);

    assert_eq!(read(&mut controller, 5), [5, 0, 0, 7, 8, 9]);
}

#[test]
fn frames_round_trip_through_led_buffer() {
    for report in [
        ReportId::Frame8,
        ReportId::Frame16,
        ReportId::Frame32,
        ReportId::Frame64,
    ] {
        let (mut controller, _log) = controller_in(Mode::PixelSerial);
        let written = frame_report(report, 0);

        assert_eq!(controller.set_report(&written), WriteProgress::Complete);
        run_until_idle(&mut controller);

        assert_eq!(read(&mut controller, report.id()), written, "{report}");
    }
}

#[test]
fn frame_arms_its_pixel_count_on_its_channel() {
    let (mut controller, log) = controller_in(Mode::PixelSerial);
    let written = frame_report(ReportId::Frame16, 2);

    controller.set_report(&written);

    assert_eq!(
        controller.state().task(),
        DeferredTask::send_pixel_data(PixelChannel::from_wire(2), 16)
    );
    run_until_idle(&mut controller);
    assert_eq!(
        log.sends(),
        [(PixelChannel::from_wire(2), written[2..].to_vec())]
    );
}

#[test]
fn frame_reconstruction_is_independent_of_chunk_size() {
    let written = frame_report(ReportId::Frame32, 1);
    let (mut reference, _log) = controller_in(Mode::PixelSerial);
    reference.set_report(&written);

    for chunk_len in 1..=TRANSFER_CHUNK_LEN {
        let (mut controller, _log) = controller_in(Mode::PixelSerial);
        controller.begin_transfer(written[0]);
        let mut progress = WriteProgress::Incomplete;
        for packet in written.chunks(chunk_len) {
            assert_eq!(progress, WriteProgress::Incomplete, "chunk {chunk_len}");
            progress = controller.write_chunk(packet);
        }

        assert_eq!(progress, WriteProgress::Complete, "chunk {chunk_len}");
        assert_eq!(
            controller.state().leds(),
            reference.state().leds(),
            "chunk {chunk_len}"
        );
        assert_eq!(controller.state().task(), reference.state().task());
    }
}

#[test]
fn reads_are_independent_of_packet_size() {
    let (mut controller, _log) = controller_in(Mode::PixelSerial);
    let written = frame_report(ReportId::Frame64, 0);
    controller.set_report(&written);
    run_until_idle(&mut controller);

    for packet_len in [1, 2, 7, 8, 31, 32] {
        controller.begin_transfer(ReportId::Frame64.id());
        let mut collected = Vec::new();
        let mut packet = vec![0u8; packet_len];
        loop {
            let len = controller.read_chunk(&mut packet);
            if len == 0 {
                break;
            }
            collected.extend_from_slice(&packet[..len]);
        }

        assert_eq!(collected, written, "packet {packet_len}");
    }
}

#[test]
fn write_after_completion_is_terminal() {
    let (mut controller, _log) = controller_in(Mode::PixelSerial);
    controller.begin_transfer(ReportId::Frame8.id());
    let written = frame_report(ReportId::Frame8, 0);
    assert_eq!(controller.write_chunk(&written), WriteProgress::Complete);
    run_until_idle(&mut controller);
    let leds = controller.state().leds().clone();

    assert_eq!(controller.write_chunk(&[9; 16]), WriteProgress::Complete);

    assert_eq!(controller.state().leds(), &leds);
    assert!(controller.state().task().is_idle());
}

#[test]
fn oversized_write_is_truncated_to_the_payload() {
    let (mut controller, _log) = controller_in(Mode::Analog);
    let mut written = vec![2];
    written.extend([b'x'; 40]);

    controller.set_report(&written);

    let image = controller.store().image();
    assert_eq!(&image[NAME_REGION], &[b'x'; 32]);
    assert_eq!(&image[DATA_REGION], &[ERASED_BYTE; 32]);
}

#[test]
fn unknown_report_is_acknowledged_and_reads_empty() {
    let (mut controller, log) = controller_in(Mode::Analog);

    assert_eq!(controller.set_report(&[10, 1, 2, 3]), WriteProgress::Complete);
    assert_eq!(controller.get_report(0, &mut [0u8; 8]), 0);
    assert_eq!(controller.get_report(42, &mut [0u8; 8]), 0);

    assert_eq!(controller.store().image(), &{
        let mut image = [ERASED_BYTE; CONFIG_STORE_LEN];
        image[MODE_OFFSET] = 0;
        image
    });
    assert!(log.events().is_empty());
}

#[test]
fn color_write_does_not_suspend_usb() {
    let (mut controller, log) = controller_in(Mode::Analog);

    controller.set_report(&[1, 1, 2, 3]);

    assert!(!log.events().contains(&SimEvent::Suspend));
}

#[test]
fn name_write_flushes_store_once_on_completion() {
    let (mut controller, log) = controller_in(Mode::Analog);
    let name: Vec<u8> = (0..32).map(|i| b'A' + i).collect();
    let written = with_id(2, &name);
    let (first, rest) = written.split_at(TRANSFER_CHUNK_LEN);

    controller.begin_transfer(2);
    assert_eq!(controller.write_chunk(first), WriteProgress::Incomplete);
    assert!(!log.events().contains(&SimEvent::Flush));
    assert_eq!(controller.write_chunk(rest), WriteProgress::Complete);

    assert_eq!(log.events(), [SimEvent::Flush]);
    assert_eq!(&controller.store().image()[NAME_REGION], name.as_slice());
}

#[test]
fn every_store_report_flushes_exactly_once() {
    for written in [with_id(2, &[b'n'; 32]), with_id(3, &[7; 32]), vec![4, 1]] {
        let (mut controller, log) = controller_in(Mode::Analog);

        controller.set_report(&written);

        let flushes = log.events().iter().filter(|e| **e == SimEvent::Flush).count();
        assert_eq!(flushes, 1, "report {}", written[0]);
    }
}

#[test]
fn empty_first_packet_leaves_id_byte_pending() {
    let (mut controller, _log) = controller_in(Mode::PixelSerial);
    let written = frame_report(ReportId::Frame8, 0);

    controller.begin_transfer(written[0]);
    assert_eq!(controller.write_chunk(&[]), WriteProgress::Incomplete);
    assert_eq!(controller.write_chunk(&written), WriteProgress::Complete);

    assert_eq!(controller.state().leds().pixel_bytes(0, 1), Some(&written[2..5]));
    assert_eq!(
        controller.state().task(),
        DeferredTask::send_pixel_data(PixelChannel::from_wire(0), 8)
    );
}
