//! HID report identifiers, their payload layout, and the per-transaction transfer cursor.

use core::ops::Range;

use derive_more::Display;

use crate::config_store::{DATA_REGION, NAME_REGION};
use crate::pixel::BYTES_PER_PIXEL;

/// Largest chunk the USB engine moves per packet.
pub const TRANSFER_CHUNK_LEN: usize = 32;

/// Pixels carried by the smallest frame report (id 6).
pub const MIN_FRAME_PIXELS: usize = 8;

/// Longest logical payload of any report (id 9: channel + 64 pixels).
pub const MAX_PAYLOAD_LEN: usize = 1 + MIN_FRAME_PIXELS * 8 * BYTES_PER_PIXEL;

/// Longest report on the wire: the id byte plus [`MAX_PAYLOAD_LEN`].
pub const MAX_REPORT_LEN: usize = 1 + MAX_PAYLOAD_LEN;

/// HID report identifiers understood by the device.
///
/// Reads and writes share the id space. Payload lengths exclude the leading id byte.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ReportId {
    /// Analog color, `[G, R, B]`.
    Color = 1,
    /// Device name stored at [`NAME_REGION`].
    Name = 2,
    /// Data blob stored at [`DATA_REGION`].
    Data = 3,
    /// Operating mode, `[mode]`.
    Mode = 4,
    /// One pixel, `[channel, index, G, R, B]`.
    IndexedPixel = 5,
    /// `[channel, 8 pixels]`.
    Frame8 = 6,
    /// `[channel, 16 pixels]`.
    Frame16 = 7,
    /// `[channel, 32 pixels]`.
    Frame32 = 8,
    /// `[channel, 64 pixels]`.
    Frame64 = 9,
}

impl ReportId {
    /// Every report, in id order.
    pub const ALL: [Self; 9] = [
        Self::Color,
        Self::Name,
        Self::Data,
        Self::Mode,
        Self::IndexedPixel,
        Self::Frame8,
        Self::Frame16,
        Self::Frame32,
        Self::Frame64,
    ];

    /// Decode a report id; unknown ids yield `None`.
    #[must_use]
    pub const fn from_wire(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::Color),
            2 => Some(Self::Name),
            3 => Some(Self::Data),
            4 => Some(Self::Mode),
            5 => Some(Self::IndexedPixel),
            6 => Some(Self::Frame8),
            7 => Some(Self::Frame16),
            8 => Some(Self::Frame32),
            9 => Some(Self::Frame64),
            _ => None,
        }
    }

    /// The id byte on the wire.
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Pixels carried by a frame report (ids 6–9): `8 · 2^(id − 6)`.
    #[must_use]
    pub const fn frame_pixels(self) -> Option<usize> {
        match self {
            Self::Frame8 => Some(MIN_FRAME_PIXELS),
            Self::Frame16 => Some(MIN_FRAME_PIXELS * 2),
            Self::Frame32 => Some(MIN_FRAME_PIXELS * 4),
            Self::Frame64 => Some(MIN_FRAME_PIXELS * 8),
            _ => None,
        }
    }

    /// Logical payload length, matching the report descriptor's REPORT_COUNT.
    #[must_use]
    pub const fn payload_len(self) -> usize {
        match self {
            Self::Color => 3,
            Self::Name => NAME_REGION.end - NAME_REGION.start,
            Self::Data => DATA_REGION.end - DATA_REGION.start,
            Self::Mode => 1,
            Self::IndexedPixel => 5,
            Self::Frame8 | Self::Frame16 | Self::Frame32 | Self::Frame64 => match self.frame_pixels() {
                Some(pixels) => 1 + pixels * BYTES_PER_PIXEL,
                None => 0,
            },
        }
    }

    /// Base offset of this report's bytes inside the configuration store, if it maps there.
    #[must_use]
    pub const fn store_offset(self) -> Option<usize> {
        match self {
            Self::Name => Some(NAME_REGION.start),
            Self::Data => Some(DATA_REGION.start),
            _ => None,
        }
    }
}

/// Vendor-defined HID report descriptor: nine 8-bit feature reports, ids 1–9.
///
/// REPORT_COUNT for each id equals [`ReportId::payload_len`].
pub const HID_REPORT_DESCRIPTOR: [u8; 96] = [
    0x06, 0x00, 0xff, // USAGE_PAGE (Vendor Defined 0xFF00)
    0x09, 0x01, // USAGE (Vendor Usage 1)
    0xa1, 0x01, // COLLECTION (Application)
    0x15, 0x00, //   LOGICAL_MINIMUM (0)
    0x26, 0xff, 0x00, //   LOGICAL_MAXIMUM (255)
    0x75, 0x08, //   REPORT_SIZE (8)
    0x85, 0x01, //   REPORT_ID (1)
    0x95, 0x03, //   REPORT_COUNT (3)
    0x09, 0x00, //   USAGE (Undefined)
    0xb2, 0x02, 0x01, //   FEATURE (Data,Var,Abs,Buf)
    0x85, 0x02, //   REPORT_ID (2)
    0x95, 0x20, //   REPORT_COUNT (32)
    0x09, 0x00, //   USAGE (Undefined)
    0xb2, 0x02, 0x01, //   FEATURE (Data,Var,Abs,Buf)
    0x85, 0x03, //   REPORT_ID (3)
    0x95, 0x20, //   REPORT_COUNT (32)
    0x09, 0x00, //   USAGE (Undefined)
    0xb2, 0x02, 0x01, //   FEATURE (Data,Var,Abs,Buf)
    0x85, 0x04, //   REPORT_ID (4)
    0x95, 0x01, //   REPORT_COUNT (1)
    0x09, 0x00, //   USAGE (Undefined)
    0xb2, 0x02, 0x01, //   FEATURE (Data,Var,Abs,Buf)
    0x85, 0x05, //   REPORT_ID (5)
    0x95, 0x05, //   REPORT_COUNT (5)
    0x09, 0x00, //   USAGE (Undefined)
    0xb2, 0x02, 0x01, //   FEATURE (Data,Var,Abs,Buf)
    0x85, 0x06, //   REPORT_ID (6)
    0x95, 0x19, //   REPORT_COUNT (25)
    0x09, 0x00, //   USAGE (Undefined)
    0xb2, 0x02, 0x01, //   FEATURE (Data,Var,Abs,Buf)
    0x85, 0x07, //   REPORT_ID (7)
    0x95, 0x31, //   REPORT_COUNT (49)
    0x09, 0x00, //   USAGE (Undefined)
    0xb2, 0x02, 0x01, //   FEATURE (Data,Var,Abs,Buf)
    0x85, 0x08, //   REPORT_ID (8)
    0x95, 0x61, //   REPORT_COUNT (97)
    0x09, 0x00, //   USAGE (Undefined)
    0xb2, 0x02, 0x01, //   FEATURE (Data,Var,Abs,Buf)
    0x85, 0x09, //   REPORT_ID (9)
    0x95, 0xc1, //   REPORT_COUNT (193)
    0x09, 0x00, //   USAGE (Undefined)
    0xb2, 0x02, 0x01, //   FEATURE (Data,Var,Abs,Buf)
    0xc0, // END_COLLECTION
];

/// Largest fixed-layout payload staged before it is applied (report 5).
pub(crate) const STAGED_LEN: usize = 5;

/// Per-transaction bookkeeping for a payload that may span several packets.
///
/// Invariant: `current_address + bytes_remaining` equals the active report's
/// [`payload_len`](ReportId::payload_len) for as long as a report is active.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TransferCursor {
    report: Option<ReportId>,
    current_address: usize,
    bytes_remaining: usize,
    address_offset: usize,
    id_pending: bool,
    staged: [u8; STAGED_LEN],
}

impl TransferCursor {
    /// Start a transaction for the raw `report_id`, superseding any previous one.
    ///
    /// Unknown ids leave the cursor idle: nothing to read, nothing to write.
    pub fn begin(&mut self, report_id: u8) {
        let report = ReportId::from_wire(report_id);
        *self = Self {
            report,
            current_address: 0,
            bytes_remaining: report.map_or(0, ReportId::payload_len),
            address_offset: report.and_then(ReportId::store_offset).unwrap_or(0),
            id_pending: report.is_some(),
            staged: [0; STAGED_LEN],
        };
    }

    /// Drop the active transaction.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// The report being transferred, if any.
    #[must_use]
    pub const fn report(&self) -> Option<ReportId> {
        self.report
    }

    /// Logical bytes consumed so far.
    #[must_use]
    pub const fn current_address(&self) -> usize {
        self.current_address
    }

    /// Logical bytes left to move.
    #[must_use]
    pub const fn bytes_remaining(&self) -> usize {
        self.bytes_remaining
    }

    /// Base offset in the configuration store for store-backed reports.
    #[must_use]
    pub const fn address_offset(&self) -> usize {
        self.address_offset
    }

    /// Whether the next packet still carries the leading id byte.
    pub(crate) const fn id_pending(&self) -> bool {
        self.id_pending
    }

    /// The id byte has been consumed or emitted.
    pub(crate) const fn clear_id_pending(&mut self) {
        self.id_pending = false;
    }

    /// Claim up to `max` logical bytes, clamped to what remains; returns their range.
    pub(crate) fn advance(&mut self, max: usize) -> Range<usize> {
        let len = max.min(self.bytes_remaining);
        let start = self.current_address;
        self.current_address = start.saturating_add(len);
        self.bytes_remaining = self.bytes_remaining.saturating_sub(len);
        start..self.current_address
    }

    /// Scratch space for fixed-layout payloads applied once complete.
    pub(crate) const fn staged(&self) -> &[u8; STAGED_LEN] {
        &self.staged
    }

    pub(crate) const fn staged_mut(&mut self) -> &mut [u8; STAGED_LEN] {
        &mut self.staged
    }
}
