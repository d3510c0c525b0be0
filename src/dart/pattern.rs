//! # Pattern Decode and Heartbeat Filter
//!
//! Fast, tolerant decode of the one short frame shape whose layout is
//! trustworthy regardless of its CRC: the 9-byte status frame. Anything
//! longer could carry multiple transactions and must go through the
//! structural parser so nothing is decoded twice.
//!
//! The heartbeat filter runs before either decoder and drops the short
//! keepalive frames that line-sharing hardware emits to indicate bus health.

use crate::constants::{is_valid_address, ETX, STOP_FLAG};
use crate::dart::transaction::{PumpStatus, PumpTransaction};

/// Bytes that make up heartbeat chatter.
const HEARTBEAT_BYTES: [u8; 5] = [0x50, 0x51, 0x20, 0x70, 0xFA];

/// Returns true for keepalive frames that carry no pump data.
pub fn is_heartbeat(frame: &[u8]) -> bool {
    if frame.len() == 3
        && frame[0] == 0x50
        && frame[2] == STOP_FLAG
        && (frame[1] == 0x20 || frame[1] == 0x70 || (0xC1..=0xCF).contains(&frame[1]))
    {
        return true;
    }
    if frame.len() < 6 {
        return true;
    }
    frame[..frame.len() - 2]
        .iter()
        .all(|b| HEARTBEAT_BYTES.contains(b))
}

/// Matches the 9-byte status frame
/// `ADR CTRL 01 01 STATUS CRC1 CRC2 03 FA` and decodes its DC1.
///
/// Returns `None` for any other length or shape, and for status bytes that
/// do not map to a recognized code; those frames fall through to the
/// structural parser.
pub fn match_status_frame(frame: &[u8]) -> Option<PumpTransaction> {
    if frame.len() != 9 {
        return None;
    }
    if !is_valid_address(frame[0]) {
        return None;
    }
    if frame[2] != 0x01 || frame[3] != 0x01 {
        return None;
    }
    if frame[7] != ETX || frame[8] != STOP_FLAG {
        return None;
    }
    let status = PumpStatus::from_code(frame[4])?;
    Some(PumpTransaction::Status { status })
}
