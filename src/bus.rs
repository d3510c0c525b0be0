//! # Event Fan-Out
//!
//! Decoupled delivery of decoded transactions, line logs, and connection
//! state to any number of subscribers. Topics are bounded broadcast
//! channels: a slow subscriber lags and loses messages rather than ever
//! backpressuring the gateway loop.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::dart::transaction::PumpTransaction;

/// Capacity of each broadcast topic.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Returns the current wall-clock time in milliseconds since the epoch.
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One decoded transaction from a pump.
///
/// Transactions decoded from the same frame share one timestamp and are
/// published in wire order.
#[derive(Debug, Clone, Serialize)]
pub struct PumpMessage {
    pub address: u8,
    pub timestamp_ms: u64,
    pub transaction: PumpTransaction,
    pub raw_hex: String,
}

/// Classification of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Raw,
    Frame,
    Decoded,
    Sent,
    Error,
    Unknown,
}

/// A line-traffic log event with an optional hex dump.
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub timestamp_ms: u64,
    pub kind: LogKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
}

/// Connection state change of the serial transport.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionEvent {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The gateway's three event topics.
#[derive(Clone)]
pub struct EventBus {
    pump_tx: broadcast::Sender<PumpMessage>,
    log_tx: broadcast::Sender<LogEvent>,
    conn_tx: broadcast::Sender<ConnectionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (pump_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (log_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (conn_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        EventBus {
            pump_tx,
            log_tx,
            conn_tx,
        }
    }

    /// Publishes a decoded transaction. Send errors mean nobody is
    /// listening, which is fine.
    pub fn publish_pump(&self, message: PumpMessage) {
        let _ = self.pump_tx.send(message);
    }

    /// Publishes a log event.
    pub fn publish_log(&self, kind: LogKind, message: impl Into<String>, hex: Option<String>) {
        let _ = self.log_tx.send(LogEvent {
            timestamp_ms: timestamp_ms(),
            kind,
            message: message.into(),
            hex,
        });
    }

    /// Publishes a connection state change.
    pub fn publish_connection(&self, connected: bool, error: Option<String>) {
        let _ = self.conn_tx.send(ConnectionEvent { connected, error });
    }

    pub fn subscribe_pump(&self) -> broadcast::Receiver<PumpMessage> {
        self.pump_tx.subscribe()
    }

    pub fn subscribe_log(&self) -> broadcast::Receiver<LogEvent> {
        self.log_tx.subscribe()
    }

    pub fn subscribe_connection(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.conn_tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
