//! Serial port transport for the robot's USB-UART link.
//!
//! All port I/O runs on tokio's blocking pool. The port is opened with the configured
//! read timeout; a timeout only means the robot was quiet and the read is retried.

use super::transport::{LineSplitter, LineTransport};
use crate::config::SerialConfig;
use crate::error::{AppResult, TelemetryError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serialport::SerialPort;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const READ_CHUNK: usize = 1024;

/// Builder for [`SerialTransport`].
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use hexapod_telemetry::ingest::SerialTransportBuilder;
///
/// # async fn run() -> hexapod_telemetry::error::AppResult<()> {
/// let transport = SerialTransportBuilder::new("/dev/ttyUSB0", 115200)
///     .with_timeout(Duration::from_millis(500))
///     .open()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SerialTransportBuilder {
    port_name: String,
    baud_rate: u32,
    timeout: Duration,
}

impl SerialTransportBuilder {
    /// Port and baud rate, 1 second read timeout.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            timeout: Duration::from_secs(1),
        }
    }

    /// Settings from the `serial` config section.
    pub fn from_config(config: &SerialConfig) -> Self {
        Self::new(config.port.clone(), config.baudrate).with_timeout(config.timeout())
    }

    /// Set the read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Opens the port.
    pub async fn open(self) -> AppResult<SerialTransport> {
        let Self {
            port_name,
            baud_rate,
            timeout,
        } = self;

        let name = port_name.clone();
        let port = tokio::task::spawn_blocking(move || {
            serialport::new(&name, baud_rate).timeout(timeout).open()
        })
        .await?
        .map_err(|e| {
            TelemetryError::Transport(format!(
                "Failed to open serial port '{port_name}' at {baud_rate} baud: {e}"
            ))
        })?;

        info!(port = %port_name, baud_rate, "Serial port opened");
        Ok(SerialTransport {
            port_name,
            baud_rate,
            port: Some(Arc::new(Mutex::new(port))),
            splitter: LineSplitter::new(),
            ended: false,
        })
    }
}

/// Line transport over a serial port.
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    port: Option<Arc<Mutex<Box<dyn SerialPort>>>>,
    splitter: LineSplitter,
    ended: bool,
}

impl SerialTransport {
    /// Port name this transport was opened on.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Reads one chunk. `Ok(None)` is end of stream, an empty chunk a timeout.
    async fn read_chunk(&self) -> AppResult<Option<Vec<u8>>> {
        let port = self
            .port
            .clone()
            .ok_or(TelemetryError::SerialPortNotConnected)?;

        let chunk = tokio::task::spawn_blocking(move || -> std::io::Result<Option<Vec<u8>>> {
            let mut buf = [0u8; READ_CHUNK];
            match port.lock().read(&mut buf) {
                Ok(0) => Ok(None),
                Ok(n) => Ok(Some(buf[..n].to_vec())),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Some(Vec::new())),
                Err(e) => Err(e),
            }
        })
        .await??;
        Ok(chunk)
    }
}

#[async_trait]
impl LineTransport for SerialTransport {
    async fn next_line(&mut self) -> AppResult<Option<String>> {
        loop {
            if let Some(line) = self.splitter.pop() {
                return Ok(Some(line));
            }
            if self.ended {
                return Ok(self.splitter.finish());
            }
            match self.read_chunk().await? {
                Some(bytes) => self.splitter.push(&bytes),
                None => {
                    debug!(port = %self.port_name, "Serial port reported end of stream");
                    self.ended = true;
                }
            }
        }
    }

    async fn close(&mut self) -> AppResult<()> {
        if self.port.take().is_some() {
            info!(port = %self.port_name, "Serial port closed");
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("serial({} @ {} baud)", self.port_name, self.baud_rate)
    }
}
