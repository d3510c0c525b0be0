//! Mock serial port implementation for testing
//!
//! Simulates the bidirectional line without hardware: reads pop from a
//! queued receive buffer, writes land in an inspectable transmit buffer,
//! and the next operation can be forced to fail.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::dart::serial::SerialLink;

/// Mock serial port that simulates bidirectional communication
#[derive(Clone, Default)]
pub struct MockSerialPort {
    /// Data written to the port (outgoing)
    pub tx_buffer: Arc<Mutex<Vec<u8>>>,
    /// Data to be read from the port (incoming)
    pub rx_buffer: Arc<Mutex<VecDeque<u8>>>,
    /// Simulated error for the next operation
    pub next_error: Arc<Mutex<Option<io::Error>>>,
}

impl MockSerialPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue data to be read from the port
    pub fn queue_rx_data(&self, data: &[u8]) {
        self.rx_buffer.lock().unwrap().extend(data);
    }

    /// Get data that was written to the port
    pub fn get_tx_data(&self) -> Vec<u8> {
        self.tx_buffer.lock().unwrap().clone()
    }

    /// Clear all buffers
    pub fn clear(&self) {
        self.tx_buffer.lock().unwrap().clear();
        self.rx_buffer.lock().unwrap().clear();
    }

    /// Set an error to be returned on the next operation
    pub fn set_next_error(&self, error: io::Error) {
        *self.next_error.lock().unwrap() = Some(error);
    }

    fn take_error(&self) -> Option<io::Error> {
        self.next_error.lock().unwrap().take()
    }
}

impl AsyncRead for MockSerialPort {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if let Some(err) = self.take_error() {
            return Poll::Ready(Err(err));
        }
        let mut rx = self.rx_buffer.lock().unwrap();
        // An empty queue reads as end-of-stream, which tests treat as a
        // disconnected device.
        while buf.remaining() > 0 {
            match rx.pop_front() {
                Some(byte) => buf.put_slice(&[byte]),
                None => break,
            }
        }
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockSerialPort {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        if let Some(err) = self.take_error() {
            return Poll::Ready(Err(err));
        }
        self.tx_buffer.lock().unwrap().extend_from_slice(data);
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl SerialLink for MockSerialPort {
    async fn drain(&mut self) -> Result<(), io::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dart::serial::DartPort;
    use crate::error::DartError;

    #[tokio::test(start_paused = true)]
    async fn test_write_frame_transmits_then_holds_quiet_time() {
        let mock = MockSerialPort::new();
        let mut port = DartPort::with_link(mock.clone());

        let before = tokio::time::Instant::now();
        port.write_frame(&[0x50, 0x00, 0x01, 0x01, 0x00])
            .await
            .unwrap();
        let elapsed = tokio::time::Instant::now().duration_since(before);

        assert_eq!(mock.get_tx_data(), vec![0x50, 0x00, 0x01, 0x01, 0x00]);
        assert!(
            elapsed >= Duration::from_millis(50),
            "turnaround guard was {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn test_read_bytes_returns_queued_data() {
        let mock = MockSerialPort::new();
        mock.queue_rx_data(&[0x50, 0x31, 0x01]);
        let mut port = DartPort::with_link(mock.clone());

        let mut buf = [0u8; 16];
        let n = port.read_bytes(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[0x50, 0x31, 0x01]);

        // An exhausted mock reads as end-of-stream.
        assert_eq!(port.read_bytes(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_write_error_surfaces_as_serial_port_error() {
        let mock = MockSerialPort::new();
        mock.set_next_error(io::Error::new(io::ErrorKind::BrokenPipe, "line down"));
        let mut port = DartPort::with_link(mock.clone());

        let result = port.write_frame(&[0x50, 0x00]).await;
        assert!(matches!(result, Err(DartError::SerialPortError(_))));
    }
}
