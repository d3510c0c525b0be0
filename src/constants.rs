//! DART Protocol Constants
//!
//! This module defines constants used in the DART pump-interface protocol
//! implementation, covering framing, transaction numbers, control bytes,
//! and the timing and buffering parameters of the half-duplex line.

/// Lowest valid pump address on the line
pub const PUMP_ADDRESS_MIN: u8 = 0x50;

/// Highest valid pump address on the line
pub const PUMP_ADDRESS_MAX: u8 = 0x6F;

/// End-of-text byte, first half of the frame terminator
pub const ETX: u8 = 0x03;

/// Stop flag byte, second half of the frame terminator
pub const STOP_FLAG: u8 = 0xFA;

/// Minimum legal frame length: ADR + CTRL + one empty transaction + CRC + terminator
pub const MIN_FRAME_LEN: usize = 8;

/// Frames shorter than this are dropped before any decode attempt
pub const MIN_PROCESS_LEN: usize = 6;

/// Default control byte for outbound frames
pub const CTRL_DEFAULT: u8 = 0x00;

/// Control byte observed to make the RESET command take effect
pub const CTRL_RESET: u8 = 0x39;

/// Control byte observed to make the AUTHORIZE command take effect
pub const CTRL_AUTHORIZE: u8 = 0x3C;

// ----------------------------------------------------------------------------
// Command transactions (supervisor to pump)
// ----------------------------------------------------------------------------

/// CD1: single-byte pump command
pub const CD_COMMAND: u8 = 0x01;

/// CD2: allowed-nozzle set
pub const CD_ALLOWED_NOZZLES: u8 = 0x02;

/// CD3: preset volume
pub const CD_PRESET_VOLUME: u8 = 0x03;

/// CD4: preset amount
pub const CD_PRESET_AMOUNT: u8 = 0x04;

/// CD5: unit price update
pub const CD_PRICE_UPDATE: u8 = 0x05;

/// CD7: output function control
pub const CD_OUTPUT: u8 = 0x07;

/// CD9: pump parameter download
pub const CD_PARAMETERS: u8 = 0x09;

/// CD13: filling type selection
pub const CD_FILLING_TYPE: u8 = 0x0D;

/// CD14: suspend nozzle
pub const CD_SUSPEND: u8 = 0x0E;

/// CD15: resume nozzle
pub const CD_RESUME: u8 = 0x0F;

/// CD101: request total counters
pub const CD_TOTAL_COUNTERS: u8 = 0x65;

// ----------------------------------------------------------------------------
// CD1 command bytes
// ----------------------------------------------------------------------------

/// CD1 command: return current status
pub const CD1_RETURN_STATUS: u8 = 0x00;

/// CD1 command: return filling information
pub const CD1_RETURN_FILLING_INFO: u8 = 0x02;

/// CD1 command: stop the current filling
pub const CD1_STOP: u8 = 0x03;

/// CD1 command: switch the pump off
pub const CD1_SWITCH_OFF: u8 = 0x04;

/// CD1 command: reset the pump
pub const CD1_RESET: u8 = 0x05;

/// CD1 command: authorize filling
pub const CD1_AUTHORIZE: u8 = 0x06;

/// CD1 command: return pump identity
pub const CD1_RETURN_IDENTITY: u8 = 0x08;

/// CD1 command: return the unit-price table
pub const CD1_RETURN_PRICES: u8 = 0x0A;

/// The full set of CD1 command bytes the encoder accepts
pub const CD1_COMMANDS: &[u8] = &[
    0x00, 0x02, 0x03, 0x04, 0x05, 0x06, 0x08, 0x0A, 0x0D, 0x0E, 0x0F,
];

// ----------------------------------------------------------------------------
// Data transactions (pump to supervisor)
// ----------------------------------------------------------------------------

/// DC1: pump status
pub const DC_STATUS: u8 = 0x01;

/// DC2: filled volume and amount
pub const DC_FILLING_INFO: u8 = 0x02;

/// DC3: nozzle state and unit price
pub const DC_NOZZLE_STATUS: u8 = 0x03;

/// DC5: alarm code
pub const DC_ALARM: u8 = 0x05;

/// DC7: pump parameters
pub const DC_PARAMETERS: u8 = 0x07;

/// DC9: pump identity
pub const DC_IDENTITY: u8 = 0x09;

/// DC14: suspend acknowledgement
pub const DC_SUSPENDED: u8 = 0x0E;

/// DC15: resume acknowledgement
pub const DC_RESUMED: u8 = 0x0F;

/// DC101: total counters
pub const DC_COUNTERS: u8 = 0x65;

/// DC102: IFSF stand-alone mode report
pub const DC_STANDALONE_MODE: u8 = 0x66;

/// DC103: unit-price table
pub const DC_UNIT_PRICES: u8 = 0x67;

// ----------------------------------------------------------------------------
// Line timing and buffering
// ----------------------------------------------------------------------------

/// Post-transmit quiet time in milliseconds, covering RS-485 turnaround
pub const QUIET_TIME_MS: u64 = 50;

/// Ingress reassembly buffer cap; beyond this the buffer is truncated
pub const INGRESS_BUFFER_CAP: usize = 1000;

/// Bytes retained when the ingress buffer is truncated
pub const INGRESS_BUFFER_RETAIN: usize = 500;

/// Baud rates the transport accepts
pub const SUPPORTED_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200];

// ----------------------------------------------------------------------------
// Status projection
// ----------------------------------------------------------------------------

/// Depth of the per-pump status history ring
pub const STATUS_HISTORY_DEPTH: usize = 10;

/// Recency window for status stabilisation, in milliseconds
pub const STATUS_RECENT_WINDOW_MS: u64 = 2000;

/// Occurrences required before a non-priority status is exported
pub const STATUS_MODE_THRESHOLD: usize = 3;

/// Lower bound of the accepted DC3 unit price, in currency units per litre
pub const PRICE_MIN: f64 = 0.5;

/// Upper bound of the accepted DC3 unit price, in currency units per litre
pub const PRICE_MAX: f64 = 10.0;

/// Returns true when the byte is a valid pump address.
pub fn is_valid_address(address: u8) -> bool {
    (PUMP_ADDRESS_MIN..=PUMP_ADDRESS_MAX).contains(&address)
}
