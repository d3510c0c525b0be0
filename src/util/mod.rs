//! Shared utilities for hex handling and log rate limiting.

pub mod hex;
pub mod logging;

pub use hex::{decode_hex, encode_hex, format_hex_compact, parse_hex_lenient, HexError};
pub use logging::LogThrottle;
