//! # Gateway Logging
//!
//! Process-level logging for the gateway, separate from the supervisor
//! event bus: the bus carries structured events to subscribers, while this
//! module feeds the `log` facade for operators watching the process itself.
//! `env_logger` is the backend, so `RUST_LOG=dart_rs=debug` turns on
//! direction-labelled hex dumps of every frame that crosses the line.

use log::{debug, error, info, log_enabled, warn, Level};

use crate::util::hex::format_hex_compact;

/// Which way a dumped frame travelled on the RS-485 line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Gateway to pump
    Tx,
    /// Pump to gateway
    Rx,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Direction::Tx => "tx",
            Direction::Rx => "rx",
        }
    }
}

/// Installs the `env_logger` backend behind the `log` facade.
///
/// Calling this more than once keeps the first configuration, so library
/// consumers and tests may both call it freely.
pub fn init_logger() {
    let _ = env_logger::Builder::from_default_env().try_init();
}

/// Logs an error through the facade.
pub fn log_error(message: &str) {
    error!("{message}");
}

/// Logs a warning through the facade.
pub fn log_warn(message: &str) {
    warn!("{message}");
}

/// Logs at info level through the facade.
pub fn log_info(message: &str) {
    info!("{message}");
}

/// Logs at debug level through the facade.
pub fn log_debug(message: &str) {
    debug!("{message}");
}

/// Hex-dumps line traffic at debug level, labelled with its direction.
///
/// The dump is formatted lazily; with debug disabled the bytes are never
/// rendered, which matters on a line that chatters keepalives all day.
pub fn log_frame_hex(direction: Direction, data: &[u8]) {
    if log_enabled!(Level::Debug) {
        debug!("{} {}", direction.label(), format_hex_compact(data));
    }
}
