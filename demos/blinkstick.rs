#![allow(missing_docs)]
#![no_std]
#![no_main]
#![cfg(not(feature = "host"))]

use core::{convert::Infallible, panic};

use blinkstick_envoy::{
    Error, Result,
    config_store::ConfigStore,
    controller::Controller,
    rp::{
        RpWatchdog, SharedController,
        flash_store::FlashConfigStore,
        pixel_output::RpPixelOutput,
        pwm_channel::{PwmBankStatic, new_pwm_color},
        usb_hid::{UsbHidStatic, new_usb_hid, usb_task},
    },
};
use defmt::info;
use embassy_executor::Spawner;
use embassy_futures::yield_now;
use embassy_time::Delay;
use {defmt_rtt as _, panic_probe as _};

#[embassy_executor::main]
async fn main(spawner: Spawner) -> ! {
    let err = inner_main(spawner).await.unwrap_err();
    panic!("{err}");
}

async fn inner_main(spawner: Spawner) -> Result<Infallible> {
    let p = embassy_rp::init(Default::default());

    // Identity and mode come from the persisted configuration.
    let mut store = FlashConfigStore::new(p.FLASH)?;
    let serial_number = store.serial_number()?;

    static PWM_BANK_STATIC: PwmBankStatic = PwmBankStatic::new_static();
    let analog = new_pwm_color(
        &PWM_BANK_STATIC,
        (p.PWM_SLICE0, p.PIN_0),
        (p.PWM_SLICE1, p.PIN_2),
        (p.PWM_SLICE2, p.PIN_4),
    );
    let pixels = RpPixelOutput::new(p.PIO0, p.PIN_6, p.PIN_7, p.PIN_8);
    let watchdog = RpWatchdog::start(p.WATCHDOG);

    static USB_HID_STATIC: UsbHidStatic = UsbHidStatic::new_static();
    static CONTROLLER: SharedController = SharedController::new();

    // Power-on acknowledgment flash for the persisted mode.
    let mut controller = Controller::new(
        store,
        analog,
        pixels,
        USB_HID_STATIC.gate(),
        Delay,
        watchdog,
    );
    controller.start();
    CONTROLLER.install(controller);

    let device = new_usb_hid(&USB_HID_STATIC, p.USB, serial_number, &CONTROLLER);
    spawner.spawn(usb_task(device)).map_err(Error::TaskSpawn)?;
    info!("Ready");

    loop {
        CONTROLLER.with(Controller::poll);
        yield_now().await;
    }
}
