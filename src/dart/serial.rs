//! # Half-Duplex Serial Transport
//!
//! Wraps the serial device behind the gateway. The line is RS-485
//! half-duplex, so every transmit is followed by a drain and a fixed quiet
//! time before the next operation; without the pause the pump's response
//! collides with the tail of the transmission during driver turnaround.
//!
//! The port is always opened 8N1; only the device path and baud rate come
//! from configuration.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::sleep;
use tokio_serial::SerialPortBuilderExt;

use crate::constants::{QUIET_TIME_MS, SUPPORTED_BAUD_RATES};
use crate::error::DartError;

/// Baud rates supported on the pump interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DartBaudRate {
    Baud9600 = 9600,
    Baud19200 = 19200,
    Baud38400 = 38400,
    Baud57600 = 57600,
    Baud115200 = 115200,
}

impl DartBaudRate {
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }
}

impl From<u32> for DartBaudRate {
    fn from(value: u32) -> Self {
        match value {
            19200 => DartBaudRate::Baud19200,
            38400 => DartBaudRate::Baud38400,
            57600 => DartBaudRate::Baud57600,
            115200 => DartBaudRate::Baud115200,
            _ => DartBaudRate::Baud9600,
        }
    }
}

/// Configuration for the serial connection.
#[derive(Debug, Clone, PartialEq)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0`
    pub port: String,
    /// Line speed; must be one of the supported rates
    pub baudrate: u32,
}

impl SerialConfig {
    /// Validates that the configured baud rate is supported.
    pub fn validate(&self) -> Result<(), DartError> {
        if !SUPPORTED_BAUD_RATES.contains(&self.baudrate) {
            return Err(DartError::InvalidArgument(format!(
                "unsupported baud rate {}",
                self.baudrate
            )));
        }
        Ok(())
    }
}

/// Trait for serial port operations, so tests can inject a mock port.
#[async_trait]
pub trait SerialLink: AsyncRead + AsyncWrite + Unpin + Send {
    /// Waits until the kernel transmit buffer has fully drained.
    async fn drain(&mut self) -> Result<(), io::Error>;
}

#[async_trait]
impl SerialLink for tokio_serial::SerialStream {
    async fn drain(&mut self) -> Result<(), io::Error> {
        AsyncWriteExt::flush(self).await
    }
}

/// A handle to the half-duplex serial line.
pub struct DartPort<L: SerialLink> {
    link: L,
    quiet_time: Duration,
}

impl DartPort<tokio_serial::SerialStream> {
    /// Opens the serial device with 8 data bits, no parity, one stop bit.
    pub fn open(config: &SerialConfig) -> Result<Self, DartError> {
        config.validate()?;
        let baud = DartBaudRate::from(config.baudrate);
        let link = tokio_serial::new(&config.port, baud.as_u32())
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .open_native_async()
            .map_err(|e| DartError::SerialPortError(e.to_string()))?;
        Ok(DartPort {
            link,
            quiet_time: Duration::from_millis(QUIET_TIME_MS),
        })
    }
}

impl<L: SerialLink> DartPort<L> {
    /// Wraps an already-open link; used by tests with a mock port.
    pub fn with_link(link: L) -> Self {
        DartPort {
            link,
            quiet_time: Duration::from_millis(QUIET_TIME_MS),
        }
    }

    /// Writes a complete frame, drains the transmit buffer, then holds the
    /// line quiet for the turnaround guard before returning.
    pub async fn write_frame(&mut self, bytes: &[u8]) -> Result<(), DartError> {
        self.link
            .write_all(bytes)
            .await
            .map_err(|e| DartError::SerialPortError(e.to_string()))?;
        self.link
            .drain()
            .await
            .map_err(|e| DartError::SerialPortError(e.to_string()))?;
        sleep(self.quiet_time).await;
        Ok(())
    }

    /// Reads whatever bytes are available into `buf`.
    ///
    /// Returns the number of bytes read; 0 means the device is gone.
    pub async fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, DartError> {
        self.link
            .read(buf)
            .await
            .map_err(|e| DartError::SerialPortError(e.to_string()))
    }

    /// Closes the port. Dropping the handle closes the device.
    pub async fn disconnect(self) -> Result<(), DartError> {
        Ok(())
    }
}
