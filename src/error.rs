//! # DART Error Handling
//!
//! This module defines the DartError enum, which represents the different error
//! types that can occur in the dart-rs crate.

use thiserror::Error;

/// Represents the different error types that can occur in the DART crate.
#[derive(Debug, Error)]
pub enum DartError {
    /// Indicates an error related to the serial port communication.
    #[error("Serial port error: {0}")]
    SerialPortError(String),

    /// Indicates a pump address outside the legal line range.
    #[error("Invalid pump address: 0x{0:02X} (expected 0x50..=0x6F)")]
    InvalidAddress(u8),

    /// Indicates a command parameter out of range, rejected before encoding.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Indicates a frame that could not be parsed.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Indicates a structurally valid transaction with an unsupported number.
    #[error("Unknown transaction: 0x{0:02X}")]
    UnknownTransaction(u8),

    /// Indicates a value that does not fit the requested BCD width.
    #[error("BCD overflow: {value} does not fit in {width} bytes")]
    BcdOverflow { value: u64, width: usize },

    /// Indicates the gateway is not connected to a serial device.
    #[error("Not connected")]
    NotConnected,

    /// A catch-all error for uncategorized cases.
    #[error("Other error: {0}")]
    Other(String),
}
