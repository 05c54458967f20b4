//! Error types for Mega Duck printer operations.
//!
//! Only a missing printer and an exhausted packet send ever fail a print job.
//! Missed acknowledgements during bulk transfer are tolerated and never show
//! up here.

use crate::{model::PrinterStatus, printer::Phase};
use rusb;
use thiserror::Error;

/// Main error type for printer operations.
#[derive(Error, Debug)]
pub enum Error {
    /// USB communication error from the serial bridge.
    #[error(transparent)]
    UsbError(#[from] rusb::Error),

    /// The bridge device is not connected or not responding.
    #[error("Device is offline")]
    DeviceOffline,

    #[error("Device is missing endpoint")]
    MissingEndpoint,

    /// The printer query reported no usable printer.
    ///
    /// Nothing has been sent to the printer and the screen is untouched.
    #[error("No printer detected (status {0:?})")]
    NoPrinter(PrinterStatus),

    /// A framed packet was not accepted within the configured retries.
    ///
    /// The current row is abandoned and no trailing rows are fed.
    #[error("Packet send retries exhausted during {phase:?}")]
    PacketSendTimeout { phase: Phase },

    /// Invalid configuration parameter provided.
    #[error("Invalid configuration parameter: {0}")]
    InvalidConfig(String),

    #[error("VRAM dump must be 8192 bytes, got {0}")]
    InvalidDump(usize),

    /// A packet payload does not fit the link's transmit buffer.
    #[error("Payload of {0} bytes does not fit the transmit buffer")]
    PayloadTooLong(usize),
}
