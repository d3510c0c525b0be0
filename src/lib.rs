//! # dart-rs - A Rust Crate for DART Pump-Interface Communication
//!
//! The dart-rs crate is a bidirectional gateway between fuel dispensers
//! speaking the DART pump-interface protocol over half-duplex RS-485 and a
//! supervisory client.
//!
//! ## Features
//!
//! - Serialize supervisor commands into byte-exact DART frames and transmit
//!   them with half-duplex turnaround timing
//! - Reassemble the inbound byte stream into frames across arbitrary read
//!   boundaries, skipping wrapper blocks and heartbeat chatter
//! - Decode frames into typed transactions (status, volume and amount,
//!   nozzle and price, identity, counters, alarms, pump parameters)
//! - Maintain a per-pump state projection with idle-status stabilisation
//! - Fan out decoded transactions, line logs, and connection state to any
//!   number of subscribers
//! - Support for logging and error handling
//!
//! ## Usage
//!
//! To use the dart-rs crate in your Rust project, add the following to your
//! Cargo.toml file:
//!
//! ```toml
//! [dependencies]
//! dart-rs = "0.1.0"
//! ```
//!
//! Then, in your Rust code, you can import the necessary modules and
//! functions:
//!
//! ```rust
//! use dart_rs::{
//!     PumpGateway, GatewayConfig, PumpCommand, PumpTransaction, PumpStatus,
//!     DartError, init_logger,
//! };
//! ```

pub mod bus;
pub mod constants;
pub mod dart;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod state;
pub mod util;

pub use bus::{ConnectionEvent, EventBus, LogEvent, LogKind, PumpMessage};
pub use dart::frame::{build_frame, extract_frames, parse_frame, DartFrame, RawTransaction};
pub use dart::serial::{DartBaudRate, DartPort, SerialConfig};
pub use dart::transaction::{PriceRange, PumpCommand, PumpStatus, PumpTransaction};
pub use engine::ProtocolEngine;
pub use error::DartError;
pub use gateway::{
    parse_pump_address, AddressInput, CommandReceipt, GatewayConfig, GatewayHandle,
    GatewayStatus, PumpGateway, SendCommandRequest, UpdateConfigRequest,
};
pub use logging::{init_logger, log_debug, log_error, log_info, log_warn};
pub use state::{PumpState, PumpStateSnapshot, StateProjector};
