//! The report transfer engine: moves HID feature-report payloads between the USB
//! engine and the device state, one packet at a time.
//!
//! A transaction starts with [`Controller::begin_transfer`] (the setup stage names
//! the report id), then the engine calls [`Controller::write_chunk`] for each OUT
//! packet or [`Controller::read_chunk`] for each IN packet. The first packet of a
//! transaction carries the report id byte; it is consumed or emitted but never
//! counted against the logical payload. Packet boundaries never change the result.
//!
//! Logical payload layouts (excluding the id byte):
//!
//! | id  | bytes              | on completion of a write                     |
//! |-----|--------------------|----------------------------------------------|
//! | 1   | `G R B`            | color applied per mode                       |
//! | 2,3 | 32 store bytes     | store flushed (bytes land as they arrive)    |
//! | 4   | `mode`             | mode persisted, `ApplyMode` armed            |
//! | 5   | `ch idx G R B`     | pixel stored, `SendPixelData` armed          |
//! | 6–9 | `ch` + N pixels    | `SendPixelData` armed for N pixels           |

use smart_leds::RGB8;

use crate::config_store::ConfigStore;
use crate::controller::{Board, Controller};
use crate::mode::Mode;
use crate::pixel::{MAX_LEDS, PixelChannel, send_pixels};
use crate::report::{ReportId, TRANSFER_CHUNK_LEN};
use crate::scheduler::DeferredTask;

/// Outcome of feeding one OUT packet to [`Controller::write_chunk`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteProgress {
    /// More bytes are expected.
    Incomplete,
    /// The payload is complete (or there was nothing to receive).
    Complete,
}

impl WriteProgress {
    /// Whether the transaction has finished.
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl<B: Board> Controller<B> {
    /// Setup stage: start a read or write of `report_id`.
    ///
    /// Unknown ids leave the cursor idle; reads then return no bytes and writes are
    /// acknowledged without effect.
    pub fn begin_transfer(&mut self, report_id: u8) {
        if ReportId::from_wire(report_id).is_none() {
            warn!("Unknown report id {}", report_id);
        }
        self.state.cursor.begin(report_id);
    }

    /// Data stage of a write: absorb one OUT packet.
    ///
    /// Bytes past the end of the logical payload are ignored. Once the payload is
    /// complete, further packets are acknowledged without effect.
    pub fn write_chunk(&mut self, packet: &[u8]) -> WriteProgress {
        let Some(report) = self.state.cursor.report() else {
            return WriteProgress::Complete;
        };
        if self.state.cursor.bytes_remaining() == 0 {
            return WriteProgress::Complete;
        }

        let mut payload = packet;
        if self.state.cursor.id_pending() && !packet.is_empty() {
            self.state.cursor.clear_id_pending();
            payload = packet.get(1..).unwrap_or_default();
        }

        let range = self.state.cursor.advance(payload.len());
        let payload = payload.get(..range.len()).unwrap_or_default();
        self.absorb(report, range.start, payload);

        if self.state.cursor.bytes_remaining() == 0 {
            self.finish_write(report);
            WriteProgress::Complete
        } else {
            WriteProgress::Incomplete
        }
    }

    /// Data stage of a read: fill one IN packet, returning how many bytes were written.
    ///
    /// Returns 0 once the payload has been fully sent, or for an unknown report.
    pub fn read_chunk(&mut self, packet: &mut [u8]) -> usize {
        let Some(report) = self.state.cursor.report() else {
            return 0;
        };
        if self.state.cursor.bytes_remaining() == 0 {
            return 0;
        }

        let header = usize::from(self.state.cursor.id_pending());
        if header == 1 {
            let Some(first) = packet.first_mut() else {
                return 0;
            };
            *first = report.id();
            self.state.cursor.clear_id_pending();
        }
        let Some(body) = packet.get_mut(header..) else {
            return header;
        };

        let range = self.state.cursor.advance(body.len());
        let len = range.len();
        if let Some(body) = body.get_mut(..len) {
            self.emit(report, range.start, body);
        }
        header + len
    }

    /// A whole write, split into [`TRANSFER_CHUNK_LEN`] packets the way the USB engine
    /// delivers it. `report` includes the leading id byte.
    pub fn set_report(&mut self, report: &[u8]) -> WriteProgress {
        let Some(&report_id) = report.first() else {
            return WriteProgress::Complete;
        };
        self.begin_transfer(report_id);
        let mut progress = WriteProgress::Complete;
        for packet in report.chunks(TRANSFER_CHUNK_LEN) {
            progress = self.write_chunk(packet);
        }
        progress
    }

    /// A whole read into `buffer` (id byte first), packet by packet. Returns the
    /// number of bytes written.
    pub fn get_report(&mut self, report_id: u8, buffer: &mut [u8]) -> usize {
        self.begin_transfer(report_id);
        let mut written = 0;
        while let Some(rest) = buffer.get_mut(written..) {
            let window = rest.len().min(TRANSFER_CHUNK_LEN);
            let Some(packet) = rest.get_mut(..window) else {
                break;
            };
            let len = self.read_chunk(packet);
            if len == 0 {
                break;
            }
            written += len;
        }
        written
    }

    fn absorb(&mut self, report: ReportId, start: usize, bytes: &[u8]) {
        match report {
            ReportId::Color | ReportId::Mode | ReportId::IndexedPixel => {
                let staged = self.state.cursor.staged_mut();
                for (offset, &byte) in bytes.iter().enumerate() {
                    if let Some(slot) = staged.get_mut(start + offset) {
                        *slot = byte;
                    }
                }
            }
            ReportId::Name | ReportId::Data => {
                let offset = self.state.cursor.address_offset() + start;
                if let Err(err) = self.store.write(offset, bytes) {
                    error!("Store write at {} failed: {}", offset, err);
                }
            }
            ReportId::Frame8 | ReportId::Frame16 | ReportId::Frame32 | ReportId::Frame64 => {
                for (offset, &byte) in bytes.iter().enumerate() {
                    let address = start + offset;
                    let slot = match address.checked_sub(1) {
                        None => self.state.cursor.staged_mut().first_mut(),
                        Some(led_byte) => self.state.leds.as_bytes_mut().get_mut(led_byte),
                    };
                    if let Some(slot) = slot {
                        *slot = byte;
                    }
                }
            }
        }
    }

    fn finish_write(&mut self, report: ReportId) {
        let staged = *self.state.cursor.staged();
        debug!("Report {} received", report);
        match report {
            ReportId::Color => {
                let [green, red, blue, ..] = staged;
                self.apply_color(RGB8::new(red, green, blue));
            }
            ReportId::Name | ReportId::Data => {
                if let Err(err) = self.store.flush() {
                    error!("Store flush for report {} failed: {}", report, err);
                }
            }
            ReportId::Mode => {
                let [mode, ..] = staged;
                let mode = Mode::from_stored(mode);
                self.state.mode = mode;
                if let Err(err) = self.store.persist_mode(mode) {
                    error!("Persisting mode {} failed: {}", mode, err);
                }
                self.arm(DeferredTask::apply_mode());
            }
            ReportId::IndexedPixel => {
                let [channel, index, green, red, blue] = staged;
                let index = usize::from(index);
                if index >= MAX_LEDS {
                    warn!("Pixel index {} out of range", index);
                    return;
                }
                self.state.leds.set_pixel(index, RGB8::new(red, green, blue));
                self.arm(DeferredTask::send_pixel_data(
                    PixelChannel::from_wire(channel),
                    index + 1,
                ));
            }
            ReportId::Frame8 | ReportId::Frame16 | ReportId::Frame32 | ReportId::Frame64 => {
                let [channel, ..] = staged;
                let pixels = report.frame_pixels().unwrap_or_default();
                self.arm(DeferredTask::send_pixel_data(
                    PixelChannel::from_wire(channel),
                    pixels,
                ));
            }
        }
    }

    /// Report 1 takes effect immediately, according to the current mode.
    fn apply_color(&mut self, color: RGB8) {
        match self.state.mode {
            Mode::Analog | Mode::PixelSerialWithAnalog => {
                self.state.rgb = color;
                self.analog.set(color.r, color.g, color.b);
            }
            Mode::AnalogInverted => {
                self.state.rgb = color;
                self.analog.set(!color.r, !color.g, !color.b);
            }
            Mode::PixelSerial => {
                self.state.leds.set_pixel(0, color);
                if let Some(bytes) = self.state.leds.pixel_bytes(0, 1) {
                    send_pixels(&mut self.pixels, bytes, PixelChannel::default());
                }
            }
        }
    }

    fn emit(&mut self, report: ReportId, start: usize, out: &mut [u8]) {
        if let ReportId::Name | ReportId::Data = report {
            let offset = self.state.cursor.address_offset() + start;
            if let Err(err) = self.store.read(offset, out) {
                error!("Store read at {} failed: {}", offset, err);
                out.fill(0);
            }
            return;
        }
        for (offset, slot) in out.iter_mut().enumerate() {
            *slot = self.payload_byte(report, start + offset);
        }
    }

    fn payload_byte(&self, report: ReportId, address: usize) -> u8 {
        let state = &self.state;
        let leds = state.leds.as_bytes();
        let byte = match report {
            ReportId::Color => [state.rgb.g, state.rgb.r, state.rgb.b].get(address).copied(),
            ReportId::Mode => Some(u8::from(state.mode)),
            ReportId::IndexedPixel => address.checked_sub(2).and_then(|i| leds.get(i)).copied(),
            ReportId::Frame8 | ReportId::Frame16 | ReportId::Frame32 | ReportId::Frame64 => {
                address.checked_sub(1).and_then(|i| leds.get(i)).copied()
            }
            ReportId::Name | ReportId::Data => None,
        };
        byte.unwrap_or_default()
    }
}
