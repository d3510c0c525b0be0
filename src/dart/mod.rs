//! The dart module contains the components responsible for the core DART
//! protocol implementation: BCD and CRC codecs, frame building and stream
//! reassembly, the transaction catalogue, pattern decode, and the
//! half-duplex serial transport.

pub mod bcd;
pub mod crc;
pub mod frame;
pub mod pattern;
pub mod serial;
pub mod transaction;

#[cfg(test)]
pub mod serial_mock;

pub use frame::{build_frame, extract_frames, parse_frame, DartFrame, RawTransaction};
pub use serial::{DartBaudRate, DartPort, SerialConfig, SerialLink};
pub use transaction::{
    decode_transaction, PriceRange, PumpCommand, PumpStatus, PumpTransaction,
};
