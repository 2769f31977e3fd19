//! Crate-wide error and result types.
//!
//! Errors stop at the HID protocol boundary: the report engine logs them and
//! answers the host with an acknowledgment or an empty read. Only board bring-up
//! hands them back to the caller.

use derive_more::{Display, Error};

/// Errors raised by the configuration store and board bring-up.
#[derive(Debug, Display, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A store access fell outside the persistent region.
    #[display("access outside the persistent region")]
    IndexOutOfBounds,

    /// The persisted configuration image failed validation.
    #[display("persisted configuration image is corrupted")]
    StorageCorrupted,

    /// The flash driver reported an error.
    #[cfg(feature = "pico1")]
    #[display("flash error: {_0:?}")]
    Flash(#[error(not(source))] embassy_rp::flash::Error),

    /// A background task could not be spawned.
    #[cfg(feature = "arm")]
    #[display("task spawn failed: {_0:?}")]
    TaskSpawn(#[error(not(source))] embassy_executor::SpawnError),
}

/// Result type used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;
