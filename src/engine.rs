//! # Protocol Engine
//!
//! Orchestrates both directions of the line protocol.
//!
//! Ingress: raw bytes are appended to the single reassembly buffer, complete
//! frames are extracted, and each frame runs through the decode pipeline:
//! address gate, length gate, heartbeat filter, pattern match, then
//! structural parse. Decoded transactions update the state projection and
//! fan out as pump messages; everything that fails to decode is logged and
//! the pipeline moves on. Malformed inbound traffic never stops the engine.
//!
//! The engine never acknowledges inbound traffic. An earlier build answered
//! DC1/DC3 with a status request and the pump answered that answer,
//! producing a runaway status-churn loop on real hardware. Do not reintroduce
//! acknowledgments without line captures proving the loop is gone.
//!
//! Egress: a typed command is encoded, the control byte is chosen (the
//! supervisor's override always wins), and the frame is built with its CRC.

use std::time::Instant;

use crate::bus::{timestamp_ms, EventBus, LogKind, PumpMessage};
use crate::constants::{is_valid_address, MIN_PROCESS_LEN};
use crate::dart::frame::{build_frame, extract_frames, parse_frame};
use crate::dart::pattern::{is_heartbeat, match_status_frame};
use crate::dart::transaction::{decode_transaction, PriceRange, PumpCommand, PumpTransaction};
use crate::error::DartError;
use crate::logging::{log_frame_hex, Direction};
use crate::state::{PumpState, StateProjector};
use crate::util::hex::format_hex_compact;
use crate::util::logging::LogThrottle;

/// Window and cap for unrecognized-frame log throttling.
const UNRECOGNIZED_LOG_WINDOW_MS: u64 = 1000;
const UNRECOGNIZED_LOG_CAP: u32 = 5;

/// The single-owner protocol engine for one RS-485 segment.
pub struct ProtocolEngine {
    buffer: Vec<u8>,
    projector: StateProjector,
    price_range: PriceRange,
    bus: EventBus,
    unknown_throttle: LogThrottle,
}

impl ProtocolEngine {
    pub fn new(bus: EventBus) -> Self {
        Self::with_price_range(bus, PriceRange::default())
    }

    /// Engine with a market-specific accepted price band.
    pub fn with_price_range(bus: EventBus, price_range: PriceRange) -> Self {
        ProtocolEngine {
            buffer: Vec::new(),
            projector: StateProjector::new(),
            price_range,
            bus,
            unknown_throttle: LogThrottle::new(UNRECOGNIZED_LOG_WINDOW_MS, UNRECOGNIZED_LOG_CAP),
        }
    }

    /// Feeds raw line bytes into the reassembly buffer and processes every
    /// frame that completes. Returns the pump messages decoded from this
    /// batch, in wire order.
    pub fn ingest(&mut self, bytes: &[u8]) -> Vec<PumpMessage> {
        log_frame_hex(Direction::Rx, bytes);
        self.bus
            .publish_log(LogKind::Raw, "read", Some(format_hex_compact(bytes)));

        self.buffer.extend_from_slice(bytes);
        let frames = extract_frames(&mut self.buffer);

        let mut messages = Vec::new();
        for frame in frames {
            messages.extend(self.process_frame(&frame));
        }
        self.cleanup();
        messages
    }

    /// Runs one extracted frame through the decode pipeline.
    fn process_frame(&mut self, frame: &[u8]) -> Vec<PumpMessage> {
        if frame.is_empty() || !is_valid_address(frame[0]) {
            return Vec::new();
        }
        if frame.len() < MIN_PROCESS_LEN {
            return Vec::new();
        }
        if is_heartbeat(frame) {
            return Vec::new();
        }

        let address = frame[0];
        let raw_hex = format_hex_compact(frame);
        let now = Instant::now();
        let ts = timestamp_ms();

        // The 9-byte status shape decodes on layout alone; anything else is
        // parsed structurally so multi-transaction frames are never decoded
        // twice.
        if let Some(transaction) = match_status_frame(frame) {
            return vec![self.emit(address, transaction, ts, now, &raw_hex)];
        }

        let parsed = match parse_frame(frame) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.bus
                    .publish_log(LogKind::Frame, e.to_string(), Some(raw_hex.clone()));
                return Vec::new();
            }
        };

        let mut messages = Vec::new();
        for raw in &parsed.transactions {
            match decode_transaction(raw, &self.price_range) {
                Ok(Some(transaction)) => {
                    messages.push(self.emit(address, transaction, ts, now, &raw_hex));
                }
                Ok(None) => {}
                Err(DartError::UnknownTransaction(trans)) => {
                    self.bus.publish_log(
                        LogKind::Unknown,
                        format!("unknown transaction 0x{trans:02X} from 0x{address:02X}"),
                        Some(raw_hex.clone()),
                    );
                }
                Err(e) => {
                    self.bus
                        .publish_log(LogKind::Frame, e.to_string(), Some(raw_hex.clone()));
                }
            }
        }

        if messages.is_empty() && self.unknown_throttle.allow() {
            self.bus.publish_log(
                LogKind::Unknown,
                format!("unrecognized frame from 0x{address:02X}"),
                Some(raw_hex),
            );
        } else if !messages.is_empty() {
            self.bus.publish_log(
                LogKind::Decoded,
                format!(
                    "decoded {} transaction(s) from 0x{address:02X}",
                    messages.len()
                ),
                Some(raw_hex),
            );
        }

        messages
    }

    fn emit(
        &mut self,
        address: u8,
        transaction: PumpTransaction,
        ts: u64,
        now: Instant,
        raw_hex: &str,
    ) -> PumpMessage {
        if let Some(status) = self.projector.apply(address, &transaction, now) {
            log::debug!("pump 0x{address:02X} status -> {status:?}");
        }
        let message = PumpMessage {
            address,
            timestamp_ms: ts,
            transaction,
            raw_hex: raw_hex.to_string(),
        };
        self.bus.publish_pump(message.clone());
        message
    }

    /// Trims the reassembly buffer: everything up to and including the last
    /// complete terminator goes, and a noise-filled buffer is cut to its
    /// tail.
    fn cleanup(&mut self) {
        use crate::constants::{ETX, INGRESS_BUFFER_CAP, INGRESS_BUFFER_RETAIN, STOP_FLAG};

        let last_terminator = self
            .buffer
            .windows(2)
            .rposition(|w| w == [ETX, STOP_FLAG]);
        if let Some(pos) = last_terminator {
            self.buffer.drain(..pos + 2);
        } else if self.buffer.len() > INGRESS_BUFFER_CAP {
            let cut = self.buffer.len() - INGRESS_BUFFER_RETAIN;
            self.buffer.drain(..cut);
        }
    }

    /// Drops all buffered bytes; called when the transport disconnects.
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    /// Bytes currently waiting for a frame terminator.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn pump_state(&self, address: u8) -> Option<&PumpState> {
        self.projector.pump(address)
    }

    pub fn pump_states(&self) -> impl Iterator<Item = &PumpState> {
        self.projector.pumps()
    }

    /// Forgets a pump's projection, used when configuration abandons its
    /// address.
    pub fn forget_pump(&mut self, address: u8) {
        self.projector.forget(address);
    }

    /// Builds the outbound frame for a command: encodes the transaction,
    /// picks the control byte, and frames it with the CRC.
    pub fn build_command(
        address: u8,
        control: Option<u8>,
        command: &PumpCommand,
    ) -> Result<Vec<u8>, DartError> {
        let transaction = command.encode()?;
        let control = control.unwrap_or_else(|| command.default_control());
        build_frame(address, control, &[transaction])
    }
}
