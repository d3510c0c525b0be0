//! # Pump Gateway
//!
//! The top-level handle for one RS-485 segment: owns the serial transport,
//! the protocol engine, and the event bus, and exposes the supervisor
//! request surface (send a command, read status, swap configuration).
//!
//! All mutable state lives on one cooperative loop. Supervisor requests
//! arrive over an mpsc queue and are serialized with serial readability in
//! `run`; there is nothing to lock because nothing is shared.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::bus::{EventBus, LogKind};
use crate::constants::is_valid_address;
use crate::dart::serial::{DartPort, SerialConfig};
use crate::dart::transaction::PumpCommand;
use crate::engine::ProtocolEngine;
use crate::error::DartError;
use crate::logging::{log_frame_hex, Direction};
use crate::state::PumpStateSnapshot;
use crate::util::hex::format_hex_compact;

/// Gateway configuration: the serial device and the default pump address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub port: String,
    pub baudrate: u32,
    pub pump_address: u8,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), DartError> {
        if !is_valid_address(self.pump_address) {
            return Err(DartError::InvalidAddress(self.pump_address));
        }
        SerialConfig {
            port: self.port.clone(),
            baudrate: self.baudrate,
        }
        .validate()
    }

    fn serial(&self) -> SerialConfig {
        SerialConfig {
            port: self.port.clone(),
            baudrate: self.baudrate,
        }
    }
}

/// A pump address as supervisors write it: a decimal number (80..111) or a
/// string in hex (`"0x50"`, `"50"`) or decimal (`"80"`) form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AddressInput {
    Number(u64),
    Text(String),
}

impl AddressInput {
    /// Resolves the input to a line address, or explains why it cannot be.
    pub fn resolve(&self) -> Result<u8, DartError> {
        match self {
            AddressInput::Number(n) => {
                let address = u8::try_from(*n).map_err(|_| {
                    DartError::InvalidArgument(format!("pump address {n} out of range"))
                })?;
                if !is_valid_address(address) {
                    return Err(DartError::InvalidAddress(address));
                }
                Ok(address)
            }
            AddressInput::Text(s) => parse_pump_address(s),
        }
    }
}

impl From<u8> for AddressInput {
    fn from(address: u8) -> Self {
        AddressInput::Number(address as u64)
    }
}

/// Parses a textual pump address.
///
/// A `0x` prefix forces hex. Bare strings are read as hex first, because
/// supervisors write addresses the way the line prints them ("50" is pump
/// 0x50); a bare string whose hex reading falls outside the line range is
/// retried as decimal ("80" is pump 80 = 0x50).
pub fn parse_pump_address(input: &str) -> Result<u8, DartError> {
    let trimmed = input.trim();
    if let Some(hex_part) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        let address = u8::from_str_radix(hex_part, 16).map_err(|_| {
            DartError::InvalidArgument(format!("bad hex pump address {trimmed:?}"))
        })?;
        if !is_valid_address(address) {
            return Err(DartError::InvalidAddress(address));
        }
        return Ok(address);
    }

    if let Ok(address) = u8::from_str_radix(trimmed, 16) {
        if is_valid_address(address) {
            return Ok(address);
        }
    }
    if let Ok(address) = trimmed.parse::<u8>() {
        if is_valid_address(address) {
            return Ok(address);
        }
    }
    Err(DartError::InvalidArgument(format!(
        "pump address {trimmed:?} is not a valid address (0x50..0x6F or 80..111)"
    )))
}

/// A supervisor request to put a command on the line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendCommandRequest {
    pub command: PumpCommand,
    pub pump_address: AddressInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<u8>,
}

/// The bytes a command became on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct FrameDump {
    pub hex: String,
    pub bytes: Vec<u8>,
}

/// Reply to a send-command request.
#[derive(Debug, Clone, Serialize)]
pub struct CommandReceipt {
    pub ok: bool,
    pub command_id: u64,
    pub frame: FrameDump,
}

/// Supervisor-facing view of the active configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigView {
    pub port: String,
    pub baud: u32,
    pub pump_address: String,
}

/// Reply to a status request.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    pub connected: bool,
    pub config: ConfigView,
}

/// A configuration update from the supervisor.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateConfigRequest {
    pub port: String,
    pub baud: u32,
    pub pump_address: AddressInput,
}

enum GatewayRequest {
    SendCommand(SendCommandRequest),
    GetStatus,
    UpdateConfig(UpdateConfigRequest),
    GetPumpStates,
}

enum GatewayReply {
    Command(CommandReceipt),
    Status(GatewayStatus),
    PumpStates(Vec<PumpStateSnapshot>),
}

struct Envelope {
    request: GatewayRequest,
    reply: oneshot::Sender<Result<GatewayReply, DartError>>,
}

/// Cheap clonable handle for submitting supervisor requests to a running
/// gateway loop.
#[derive(Clone)]
pub struct GatewayHandle {
    tx: mpsc::Sender<Envelope>,
    bus: EventBus,
}

impl GatewayHandle {
    async fn call(&self, request: GatewayRequest) -> Result<GatewayReply, DartError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| DartError::Other("gateway loop stopped".to_string()))?;
        reply_rx
            .await
            .map_err(|_| DartError::Other("gateway loop dropped request".to_string()))?
    }

    pub async fn send_command(
        &self,
        request: SendCommandRequest,
    ) -> Result<CommandReceipt, DartError> {
        match self.call(GatewayRequest::SendCommand(request)).await? {
            GatewayReply::Command(receipt) => Ok(receipt),
            _ => Err(DartError::Other("unexpected reply".to_string())),
        }
    }

    pub async fn get_status(&self) -> Result<GatewayStatus, DartError> {
        match self.call(GatewayRequest::GetStatus).await? {
            GatewayReply::Status(status) => Ok(status),
            _ => Err(DartError::Other("unexpected reply".to_string())),
        }
    }

    pub async fn update_config(
        &self,
        request: UpdateConfigRequest,
    ) -> Result<GatewayStatus, DartError> {
        match self.call(GatewayRequest::UpdateConfig(request)).await? {
            GatewayReply::Status(status) => Ok(status),
            _ => Err(DartError::Other("unexpected reply".to_string())),
        }
    }

    pub async fn pump_states(&self) -> Result<Vec<PumpStateSnapshot>, DartError> {
        match self.call(GatewayRequest::GetPumpStates).await? {
            GatewayReply::PumpStates(states) => Ok(states),
            _ => Err(DartError::Other("unexpected reply".to_string())),
        }
    }

    pub fn subscribe_pump(&self) -> tokio::sync::broadcast::Receiver<crate::bus::PumpMessage> {
        self.bus.subscribe_pump()
    }

    pub fn subscribe_log(&self) -> tokio::sync::broadcast::Receiver<crate::bus::LogEvent> {
        self.bus.subscribe_log()
    }

    pub fn subscribe_connection(
        &self,
    ) -> tokio::sync::broadcast::Receiver<crate::bus::ConnectionEvent> {
        self.bus.subscribe_connection()
    }
}

/// The gateway for one RS-485 segment.
pub struct PumpGateway {
    config: GatewayConfig,
    engine: ProtocolEngine,
    port: Option<DartPort<tokio_serial::SerialStream>>,
    bus: EventBus,
    requests_rx: mpsc::Receiver<Envelope>,
    next_command_id: u64,
}

enum LoopEvent {
    Read(Result<usize, DartError>),
    Request(Option<Envelope>),
}

impl PumpGateway {
    /// Request queue depth; requests beyond this wait on the submitting side.
    const REQUEST_QUEUE: usize = 32;

    /// Creates the gateway and the handle supervisors use to reach it. The
    /// run loop ends once every clone of the handle is gone.
    pub fn new(config: GatewayConfig) -> Result<(Self, GatewayHandle), DartError> {
        config.validate()?;
        let bus = EventBus::new();
        let engine = ProtocolEngine::new(bus.clone());
        let (requests_tx, requests_rx) = mpsc::channel(Self::REQUEST_QUEUE);
        let gateway = PumpGateway {
            config,
            engine,
            port: None,
            bus: bus.clone(),
            requests_rx,
            next_command_id: 0,
        };
        let handle = GatewayHandle {
            tx: requests_tx,
            bus,
        };
        Ok((gateway, handle))
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    /// Opens the serial device. Already open is a no-op.
    pub fn open(&mut self) -> Result<(), DartError> {
        if self.port.is_some() {
            return Ok(());
        }
        match DartPort::open(&self.config.serial()) {
            Ok(port) => {
                self.port = Some(port);
                self.bus.publish_connection(true, None);
                Ok(())
            }
            Err(e) => {
                self.bus.publish_connection(false, Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Closes the device and drains the reassembly buffer.
    pub fn close(&mut self) {
        if self.port.take().is_some() {
            self.engine.clear_buffer();
            self.bus.publish_connection(false, None);
        }
    }

    pub fn status(&self) -> GatewayStatus {
        GatewayStatus {
            connected: self.is_connected(),
            config: ConfigView {
                port: self.config.port.clone(),
                baud: self.config.baudrate,
                pump_address: format!("0x{:02X}", self.config.pump_address),
            },
        }
    }

    /// Swaps configuration: closes the device if open, then reopens with the
    /// new parameters. The old pump's projection is dropped when the default
    /// address changes.
    pub fn update_config(&mut self, request: UpdateConfigRequest) -> Result<GatewayStatus, DartError> {
        let pump_address = request.pump_address.resolve()?;
        let new = GatewayConfig {
            port: request.port,
            baudrate: request.baud,
            pump_address,
        };
        new.validate()?;

        self.close();
        if new.pump_address != self.config.pump_address {
            self.engine.forget_pump(self.config.pump_address);
        }
        self.config = new;
        self.open()?;
        Ok(self.status())
    }

    /// Encodes, frames, and transmits a command, returning the receipt with
    /// the exact wire bytes. The `sent` log is published before the write so
    /// observers see the request even if the line then fails.
    pub async fn send_command(
        &mut self,
        request: SendCommandRequest,
    ) -> Result<CommandReceipt, DartError> {
        let address = request.pump_address.resolve()?;
        let frame = ProtocolEngine::build_command(address, request.control, &request.command)?;

        self.next_command_id += 1;
        let command_id = self.next_command_id;
        let hex = format_hex_compact(&frame);

        self.bus.publish_log(
            LogKind::Sent,
            format!("command {command_id} to 0x{address:02X}"),
            Some(hex.clone()),
        );

        let port = self.port.as_mut().ok_or(DartError::NotConnected)?;
        log_frame_hex(Direction::Tx, &frame);
        if let Err(e) = port.write_frame(&frame).await {
            let message = e.to_string();
            self.bus
                .publish_log(LogKind::Error, message.clone(), Some(hex.clone()));
            self.drop_connection(message);
            return Err(e);
        }

        Ok(CommandReceipt {
            ok: true,
            command_id,
            frame: FrameDump { hex, bytes: frame },
        })
    }

    fn drop_connection(&mut self, error: String) {
        self.port = None;
        self.engine.clear_buffer();
        self.bus.publish_connection(false, Some(error));
    }

    /// Runs the gateway loop: serial readability and supervisor requests are
    /// the only wake-ups, and both are handled on this single task. Returns
    /// when every request handle is gone.
    pub async fn run(mut self) -> Result<(), DartError> {
        let mut read_buf = [0u8; 512];
        loop {
            let event = if let Some(port) = self.port.as_mut() {
                tokio::select! {
                    read = port.read_bytes(&mut read_buf) => LoopEvent::Read(read),
                    envelope = self.requests_rx.recv() => LoopEvent::Request(envelope),
                }
            } else {
                LoopEvent::Request(self.requests_rx.recv().await)
            };

            match event {
                LoopEvent::Read(Ok(0)) => {
                    self.drop_connection("serial device closed".to_string());
                }
                LoopEvent::Read(Ok(n)) => {
                    self.engine.ingest(&read_buf[..n]);
                }
                LoopEvent::Read(Err(e)) => {
                    self.bus
                        .publish_log(LogKind::Error, e.to_string(), None);
                    self.drop_connection(e.to_string());
                }
                LoopEvent::Request(Some(envelope)) => {
                    self.handle_request(envelope).await;
                }
                LoopEvent::Request(None) => return Ok(()),
            }
        }
    }

    async fn handle_request(&mut self, envelope: Envelope) {
        let Envelope { request, reply } = envelope;
        let result = match request {
            GatewayRequest::SendCommand(request) => {
                // A dropped reply means the supervisor gave up before the
                // frame reached the transport; nothing has been sent yet, so
                // honor the cancellation.
                if reply.is_closed() {
                    return;
                }
                self.send_command(request).await.map(GatewayReply::Command)
            }
            GatewayRequest::GetStatus => Ok(GatewayReply::Status(self.status())),
            GatewayRequest::UpdateConfig(request) => {
                self.update_config(request).map(GatewayReply::Status)
            }
            GatewayRequest::GetPumpStates => Ok(GatewayReply::PumpStates(
                self.engine.pump_states().map(|p| p.snapshot()).collect(),
            )),
        };
        let _ = reply.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pump_address_forms() {
        assert_eq!(parse_pump_address("0x50").unwrap(), 0x50);
        assert_eq!(parse_pump_address("0X6F").unwrap(), 0x6F);
        assert_eq!(parse_pump_address("50").unwrap(), 0x50);
        // hex reading of "80" is out of range, decimal 80 is pump 0x50
        assert_eq!(parse_pump_address("80").unwrap(), 0x50);
        assert_eq!(parse_pump_address("111").unwrap(), 0x6F);
        assert!(parse_pump_address("0x4F").is_err());
        assert!(parse_pump_address("112").is_err());
        assert!(parse_pump_address("pump").is_err());
    }

    #[test]
    fn test_address_input_resolution() {
        assert_eq!(AddressInput::Number(80).resolve().unwrap(), 0x50);
        assert_eq!(AddressInput::Number(111).resolve().unwrap(), 0x6F);
        assert!(AddressInput::Number(79).resolve().is_err());
        assert!(AddressInput::Number(500).resolve().is_err());
        assert_eq!(
            AddressInput::Text("0x52".to_string()).resolve().unwrap(),
            0x52
        );
    }

    #[test]
    fn test_send_command_request_json() {
        let request: SendCommandRequest = serde_json::from_str(
            r#"{"command":{"type":"CD1","data":{"command":5}},"pump_address":"0x50"}"#,
        )
        .unwrap();
        assert_eq!(request.pump_address.resolve().unwrap(), 0x50);
        assert!(request.control.is_none());

        let request: SendCommandRequest = serde_json::from_str(
            r#"{"command":{"type":"CD1","data":{"command":0}},"pump_address":80,"control":17}"#,
        )
        .unwrap();
        assert_eq!(request.pump_address.resolve().unwrap(), 0x50);
        assert_eq!(request.control, Some(17));
    }

    #[test]
    fn test_config_validation() {
        assert!(GatewayConfig {
            port: "/dev/ttyUSB0".to_string(),
            baudrate: 9600,
            pump_address: 0x50,
        }
        .validate()
        .is_ok());
        assert!(GatewayConfig {
            port: "/dev/ttyUSB0".to_string(),
            baudrate: 1200,
            pump_address: 0x50,
        }
        .validate()
        .is_err());
        assert!(GatewayConfig {
            port: "/dev/ttyUSB0".to_string(),
            baudrate: 9600,
            pump_address: 0x10,
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_status_reports_hex_address() {
        let (gateway, _handle) = PumpGateway::new(GatewayConfig {
            port: "/dev/ttyUSB0".to_string(),
            baudrate: 9600,
            pump_address: 0x52,
        })
        .unwrap();
        let status = gateway.status();
        assert!(!status.connected);
        assert_eq!(status.config.pump_address, "0x52");
        assert_eq!(status.config.baud, 9600);
    }

    #[tokio::test]
    async fn test_send_command_requires_connection() {
        let (mut gateway, _handle) = PumpGateway::new(GatewayConfig {
            port: "/dev/ttyUSB0".to_string(),
            baudrate: 9600,
            pump_address: 0x50,
        })
        .unwrap();
        let result = gateway
            .send_command(SendCommandRequest {
                command: PumpCommand::Command { command: 0x00 },
                pump_address: AddressInput::Number(80),
                control: None,
            })
            .await;
        assert!(matches!(result, Err(DartError::NotConnected)));
    }
}
