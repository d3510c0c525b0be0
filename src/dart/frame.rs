//! # DART Frame Codec
//!
//! Builds outbound frames and reassembles inbound byte streams into frames.
//!
//! A frame on the wire is `ADR CTRL (TRANS LNG DATA..)+ CRC1 CRC2 ETX SF`
//! with ETX = 0x03 and SF = 0xFA. The extractor additionally understands the
//! 3-byte wrapper blocks that line-sharing gear injects between frames and
//! skips them before they can corrupt a candidate frame.
//!
//! Parsing is deliberately tolerant: the transaction walk stops quietly when
//! a length byte would run past the CRC, and the CRC bytes are captured but
//! never checked on ingress.

use bytes::{BufMut, BytesMut};
use nom::{bytes::complete::take, number::complete::be_u8, IResult};

use crate::constants::{
    is_valid_address, ETX, INGRESS_BUFFER_CAP, INGRESS_BUFFER_RETAIN, MIN_FRAME_LEN, STOP_FLAG,
};
use crate::dart::crc::crc16_ccitt;
use crate::error::DartError;

/// One length-prefixed transaction as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    /// Transaction number (TRANS)
    pub trans: u8,
    /// Transaction payload (DATA), whose length is the LNG byte
    pub data: Vec<u8>,
}

impl RawTransaction {
    pub fn new(trans: u8, data: Vec<u8>) -> Self {
        RawTransaction { trans, data }
    }

    /// Wire length of this transaction including its two header bytes.
    pub fn wire_len(&self) -> usize {
        2 + self.data.len()
    }
}

/// A parsed inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DartFrame {
    /// Pump address (ADR)
    pub address: u8,
    /// Control byte (CTRL)
    pub control: u8,
    /// Transactions in wire order
    pub transactions: Vec<RawTransaction>,
    /// CRC bytes as received; not validated on ingress
    pub crc: u16,
}

/// Builds an outbound frame from address, control byte, and transactions.
///
/// The CRC is computed over ADR, CTRL, and the transaction bytes, and is
/// appended big-endian before the terminator.
pub fn build_frame(
    address: u8,
    control: u8,
    transactions: &[RawTransaction],
) -> Result<Vec<u8>, DartError> {
    if !is_valid_address(address) {
        return Err(DartError::InvalidAddress(address));
    }

    let body_len: usize = transactions.iter().map(RawTransaction::wire_len).sum();
    let mut buf = BytesMut::with_capacity(2 + body_len + 4);
    buf.put_u8(address);
    buf.put_u8(control);
    for tx in transactions {
        buf.put_u8(tx.trans);
        buf.put_u8(tx.data.len() as u8);
        buf.put_slice(&tx.data);
    }

    let crc = crc16_ccitt(&buf);
    buf.put_u16(crc);
    buf.put_u8(ETX);
    buf.put_u8(STOP_FLAG);
    Ok(buf.to_vec())
}

/// Extracts complete frames from a reassembly buffer.
///
/// Walks the buffer, skipping 3-byte wrapper blocks `{50|51} XX FA`, and
/// yields a frame whenever the candidate ends in `03 FA`. The buffer is left
/// holding the unconsumed remainder so the caller can append the next read.
/// A remainder that grows past the cap without ever terminating is cut down
/// to its tail to bound memory under line noise.
pub fn extract_frames(buffer: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    let mut current: Vec<u8> = Vec::new();

    let mut i = 0;
    while i < buffer.len() {
        // Wrapper blocks from line-sharing gear are not frame bytes.
        if i + 2 < buffer.len()
            && buffer[i + 2] == STOP_FLAG
            && (buffer[i] == 0x50 || buffer[i] == 0x51)
        {
            i += 3;
            continue;
        }

        current.push(buffer[i]);

        if current.len() >= 2 && current[current.len() - 2..] == [ETX, STOP_FLAG] {
            frames.push(std::mem::take(&mut current));
        }

        i += 1;
    }

    if current.len() > INGRESS_BUFFER_CAP {
        current.drain(..current.len() - INGRESS_BUFFER_RETAIN);
    }
    *buffer = current;

    frames
}

fn raw_transaction(input: &[u8]) -> IResult<&[u8], RawTransaction> {
    let (input, trans) = be_u8(input)?;
    let (input, lng) = be_u8(input)?;
    let (input, data) = take(lng as usize)(input)?;
    Ok((input, RawTransaction::new(trans, data.to_vec())))
}

/// Parses a complete frame into address, control, transactions, and CRC.
///
/// Fails when the frame is shorter than the minimum, does not end in the
/// `03 FA` terminator, carries an out-of-range address, or yields no
/// parseable transaction at all. A transaction stream that ends early (a
/// LNG byte running past the CRC) keeps whatever parsed before it.
pub fn parse_frame(frame: &[u8]) -> Result<DartFrame, DartError> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(DartError::MalformedFrame(format!(
            "frame too short: {} bytes",
            frame.len()
        )));
    }
    if frame[frame.len() - 2..] != [ETX, STOP_FLAG] {
        return Err(DartError::MalformedFrame(
            "missing 03 FA terminator".to_string(),
        ));
    }

    let address = frame[0];
    if !is_valid_address(address) {
        return Err(DartError::MalformedFrame(format!(
            "address 0x{address:02X} out of range"
        )));
    }
    let control = frame[1];

    let body = &frame[2..frame.len() - 4];
    let crc = u16::from_be_bytes([frame[frame.len() - 4], frame[frame.len() - 3]]);

    let mut transactions = Vec::new();
    let mut input = body;
    while !input.is_empty() {
        match raw_transaction(input) {
            Ok((rest, tx)) => {
                // A stuck parser must not loop forever.
                if rest.len() >= input.len() {
                    break;
                }
                transactions.push(tx);
                input = rest;
            }
            // LNG ran past the CRC or the header was truncated.
            Err(_) => break,
        }
    }

    if transactions.is_empty() {
        return Err(DartError::MalformedFrame(
            "no parseable transaction".to_string(),
        ));
    }

    Ok(DartFrame {
        address,
        control,
        transactions,
        crc,
    })
}
