//! # Hex Encoding/Decoding Utilities
//!
//! Helpers used throughout the gateway for line-traffic visualization,
//! log events, and capture-file ingestion.
//!
//! ## Usage
//!
//! ```rust
//! use dart_rs::util::hex::{encode_hex, decode_hex, format_hex_compact};
//!
//! let data = [0x50, 0x00, 0x01, 0x01];
//! assert_eq!(encode_hex(&data), "50000101");
//! assert_eq!(decode_hex("50000101").unwrap(), data);
//! assert_eq!(format_hex_compact(&data), "50 00 01 01");
//! ```

use thiserror::Error;

/// Errors that can occur during hex operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("Odd number of hex characters: {0}")]
    OddLength(usize),

    #[error("Empty hex string")]
    EmptyString,

    #[error("Hex decoding error: {0}")]
    DecodeError(String),
}

/// Encode bytes to lowercase hex string
pub fn encode_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Encode bytes to uppercase hex string
pub fn encode_hex_upper(data: &[u8]) -> String {
    hex::encode_upper(data)
}

/// Decode hex string to bytes
///
/// Accepts both uppercase and lowercase hex characters.
/// Whitespace is automatically stripped.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, HexError> {
    if hex_str.is_empty() {
        return Err(HexError::EmptyString);
    }

    let cleaned: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.len() % 2 != 0 {
        return Err(HexError::OddLength(cleaned.len()));
    }

    hex::decode(&cleaned).map_err(|e| HexError::DecodeError(e.to_string()))
}

/// Format hex data for compact display (useful for logs)
///
/// Formats data as "50 00 01 01" with spaces between bytes.
pub fn format_hex_compact(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse hex that may contain spaces or other separators
///
/// More lenient than decode_hex, strips all non-hex characters. Used when
/// ingesting capture files whose lines mix hex payloads with annotations.
pub fn parse_hex_lenient(input: &str) -> Result<Vec<u8>, HexError> {
    let hex_chars: String = input.chars().filter(|c| c.is_ascii_hexdigit()).collect();

    if hex_chars.is_empty() {
        return Err(HexError::EmptyString);
    }

    if hex_chars.len() % 2 != 0 {
        return Err(HexError::OddLength(hex_chars.len()));
    }

    hex::decode(&hex_chars).map_err(|e| HexError::DecodeError(e.to_string()))
}

/// Helper for creating test data from hex strings
///
/// Panics on invalid hex (intended for test code only).
pub fn hex_to_bytes(hex: &str) -> Vec<u8> {
    decode_hex(hex).expect("Invalid hex in test data")
}
