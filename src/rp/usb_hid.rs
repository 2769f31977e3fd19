//! The USB HID binding: feature-report control transfers in, [`Controller`] calls out.
//!
//! `embassy-usb` hands over whole reports; the handler feeds them to the transfer
//! engine in [`TRANSFER_CHUNK_LEN`] packets. While a deferred task is in flight the
//! [`UsbGate`] is closed and every SET_REPORT / GET_REPORT is refused.
//!
//! # Busy requests stall
//!
//! A closed gate answers with a STALL, not a NAK. `RequestHandler` is synchronous, so
//! the handler cannot hold a control transfer open until the gate reopens, and
//! `embassy-usb` has no way to NAK a data stage from it. The host therefore sees a
//! failed request during the settle window (at most [`SETTLE_CYCLES`](crate::scheduler::SETTLE_CYCLES) loop passes
//! plus one transmission) and has to retry it itself.

use embassy_rp::Peri;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::USB;
use embassy_rp::usb::{Driver, InterruptHandler};
use embassy_usb::class::hid::{Config as HidConfig, HidWriter, ReportId, RequestHandler, State};
use embassy_usb::control::OutResponse;
use embassy_usb::{Builder, UsbDevice};
use portable_atomic::{AtomicBool, Ordering};
use static_cell::StaticCell;

use crate::config_store::SERIAL_NUMBER_LEN;
use crate::controller::UsbControl;
use crate::report::{HID_REPORT_DESCRIPTOR, MAX_REPORT_LEN, TRANSFER_CHUNK_LEN};
use crate::rp::SharedController;

/// Vendor id (shared vendor id block).
pub const USB_VID: u16 = 0x20A0;
/// Product id.
pub const USB_PID: u16 = 0x41E5;

const MANUFACTURER: &str = "Agile Innovative Ltd";
const PRODUCT: &str = "BlinkStick";

const CONTROL_BUF_LEN: usize = 256;
const DESCRIPTOR_BUF_LEN: usize = 256;

const _: () = assert!(MAX_REPORT_LEN <= CONTROL_BUF_LEN);

#[allow(unsafe_code, reason = "interrupt vector generated by bind_interrupts!")]
mod irqs {
    use super::{InterruptHandler, USB, bind_interrupts};

    bind_interrupts!(pub(super) struct Irqs {
        USBCTRL_IRQ => InterruptHandler<USB>;
    });
}

/// The USB device type this binding builds.
pub type RpUsbDevice = UsbDevice<'static, Driver<'static, USB>>;

/// Static resources for the USB HID binding.
pub struct UsbHidStatic {
    suspended: AtomicBool,
    serial_number: StaticCell<heapless::String<SERIAL_NUMBER_LEN>>,
    config_descriptor: StaticCell<[u8; DESCRIPTOR_BUF_LEN]>,
    bos_descriptor: StaticCell<[u8; DESCRIPTOR_BUF_LEN]>,
    msos_descriptor: StaticCell<[u8; DESCRIPTOR_BUF_LEN]>,
    control_buf: StaticCell<[u8; CONTROL_BUF_LEN]>,
    hid_state: StaticCell<State<'static>>,
    handler: StaticCell<ReportHandler>,
}

impl UsbHidStatic {
    /// Create static resources for the USB HID binding.
    #[must_use]
    pub const fn new_static() -> Self {
        Self {
            suspended: AtomicBool::new(false),
            serial_number: StaticCell::new(),
            config_descriptor: StaticCell::new(),
            bos_descriptor: StaticCell::new(),
            msos_descriptor: StaticCell::new(),
            control_buf: StaticCell::new(),
            hid_state: StaticCell::new(),
            handler: StaticCell::new(),
        }
    }

    /// The flow-control handle the controller uses to open and close the gate.
    #[must_use]
    pub fn gate(&'static self) -> UsbGate {
        UsbGate {
            suspended: &self.suspended,
        }
    }
}

/// Opens and closes the binding to new host requests.
pub struct UsbGate {
    suspended: &'static AtomicBool,
}

impl UsbControl for UsbGate {
    fn suspend_new_transactions(&mut self) {
        self.suspended.store(true, Ordering::Release);
    }

    fn resume_new_transactions(&mut self) {
        self.suspended.store(false, Ordering::Release);
    }
}

/// Routes HID feature-report requests to the shared controller.
pub struct ReportHandler {
    controller: &'static SharedController,
    suspended: &'static AtomicBool,
}

impl ReportHandler {
    fn accepting(&self) -> bool {
        !self.suspended.load(Ordering::Acquire)
    }
}

impl RequestHandler for ReportHandler {
    fn get_report(&mut self, id: ReportId, buf: &mut [u8]) -> Option<usize> {
        let ReportId::Feature(id) = id else {
            return None;
        };
        if !self.accepting() {
            debug!("GET_REPORT {} refused while busy", id);
            return None;
        }
        self.controller
            .with(|controller| controller.get_report(id, buf))
    }

    fn set_report(&mut self, id: ReportId, data: &[u8]) -> OutResponse {
        let ReportId::Feature(id) = id else {
            return OutResponse::Rejected;
        };
        if !self.accepting() {
            debug!("SET_REPORT {} refused while busy", id);
            return OutResponse::Rejected;
        }
        if data.first() != Some(&id) {
            warn!("SET_REPORT {} payload does not start with its id", id);
        }
        let handled = self.controller.with(|controller| {
            controller.begin_transfer(id);
            for packet in data.chunks(TRANSFER_CHUNK_LEN) {
                if controller.write_chunk(packet).is_complete() {
                    break;
                }
            }
        });
        match handled {
            Some(()) => OutResponse::Accepted,
            None => OutResponse::Rejected,
        }
    }
}

/// Build the USB device with one vendor-defined HID interface.
///
/// `serial_number` becomes the device's serial-number string. Run the returned device
/// with [`usb_task`].
pub fn new_usb_hid(
    usb_hid_static: &'static UsbHidStatic,
    usb: Peri<'static, USB>,
    serial_number: heapless::String<SERIAL_NUMBER_LEN>,
    controller: &'static SharedController,
) -> RpUsbDevice {
    let driver = Driver::new(usb, irqs::Irqs);

    let serial_number: &'static heapless::String<SERIAL_NUMBER_LEN> =
        usb_hid_static.serial_number.init(serial_number);
    let serial_number = serial_number.as_str();
    info!("USB serial number {}", serial_number);

    let mut config = embassy_usb::Config::new(USB_VID, USB_PID);
    config.manufacturer = Some(MANUFACTURER);
    config.product = Some(PRODUCT);
    config.serial_number = Some(serial_number);
    config.max_power = 100;
    config.max_packet_size_0 = 64;

    let mut builder = Builder::new(
        driver,
        config,
        usb_hid_static.config_descriptor.init([0; DESCRIPTOR_BUF_LEN]),
        usb_hid_static.bos_descriptor.init([0; DESCRIPTOR_BUF_LEN]),
        usb_hid_static.msos_descriptor.init([0; DESCRIPTOR_BUF_LEN]),
        usb_hid_static.control_buf.init([0; CONTROL_BUF_LEN]),
    );

    let handler = usb_hid_static.handler.init(ReportHandler {
        controller,
        suspended: &usb_hid_static.suspended,
    });
    let hid_config = HidConfig {
        report_descriptor: &HID_REPORT_DESCRIPTOR,
        request_handler: Some(handler),
        poll_ms: 10,
        max_packet_size: 8,
    };
    // Only the control pipe carries data; the interrupt IN endpoint is never written.
    let _writer = HidWriter::<_, 8>::new(
        &mut builder,
        usb_hid_static.hid_state.init(State::new()),
        hid_config,
    );

    builder.build()
}

/// Runs the USB device forever.
#[embassy_executor::task]
pub async fn usb_task(mut device: RpUsbDevice) -> ! {
    device.run().await
}
