//! Firmware core for a multi-mode USB HID LED controller.
//!
//! The device enumerates as a vendor-defined HID and exposes nine feature reports.
//! Depending on its persisted [`Mode`](mode::Mode) it drives a three-channel analog
//! (PWM) RGB output, up to three WS2812-style pixel outputs, or both.
//!
//! The core is board independent: a [`Controller`](controller::Controller) drives
//! capability traits named by a [`Board`](controller::Board). The RP2040 binding
//! lives in `rp` (feature `pico1`); `sim` (feature `host`) records every capability
//! call for tests.
//!
//! # Glossary
//!
//! - **Feature report:** a HID report moved over control transfers, in either
//!   direction, identified by its first byte.
//! - **Pixel protocol:** a single-wire, timing-encoded serial protocol for chained
//!   RGB LEDs; bytes go out in G, R, B order, MSB first.
//! - **Deferred task:** work a completed write leaves for the main loop; see
//!   [`scheduler`].
#![cfg_attr(not(feature = "host"), no_std)]
#![cfg_attr(not(feature = "host"), no_main)]

#[cfg(all(not(feature = "pico1"), not(feature = "host")))]
compile_error!("Must enable a board feature ('pico1') or the 'host' feature");

#[cfg(all(feature = "pico1", feature = "host"))]
compile_error!("Cannot enable both 'pico1' and 'host' features simultaneously");

#[cfg(all(feature = "pico1", not(feature = "arm")))]
compile_error!("Pico 1 (RP2040) requires the 'arm' feature");

// Must come first so the logging macros are visible to every module below.
#[macro_use]
mod fmt;

pub mod config_store;
pub mod controller;
mod error;
pub mod mode;
pub mod pixel;
pub mod pwm_color;
pub mod report;
#[cfg(feature = "pico1")]
pub mod rp;
pub mod scheduler;
#[cfg(feature = "host")]
pub mod sim;
pub mod transfer;

// Re-export error types and result (used throughout)
pub use crate::error::{Error, Result};
