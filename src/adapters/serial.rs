//! Serial (UART) wire transport.
//!
//! Wraps the `serialport` crate and provides async I/O by running the
//! blocking serial operations on Tokio's blocking task executor. The port
//! sits behind an `Arc<Mutex<...>>` so the blocking closures can own a
//! handle across the `spawn_blocking` boundary; the bridge worker is the
//! only caller, so the lock is never contended.

use crate::config::SerialSettings;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::debug;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::WireTransport;

/// Short poll interval for the underlying port; the overall response
/// deadline is enforced separately so a quiet wire is detected as an empty
/// line, not an I/O error.
const PORT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Line-oriented serial transport for the UART register protocol.
pub struct SerialWire {
    port_name: String,
    timeout: Duration,
    port: Arc<Mutex<Box<dyn SerialPort>>>,
}

impl SerialWire {
    /// Open the serial device described by `settings`.
    pub fn open(settings: &SerialSettings) -> Result<Self> {
        let port = serialport::new(&settings.port, settings.baud_rate)
            .timeout(PORT_POLL_TIMEOUT)
            .open()
            .with_context(|| {
                format!(
                    "failed to open serial port '{}' at {} baud",
                    settings.port, settings.baud_rate
                )
            })?;

        debug!(
            "serial port '{}' opened at {} baud",
            settings.port, settings.baud_rate
        );

        Ok(SerialWire {
            port_name: settings.port.clone(),
            timeout: settings.timeout(),
            port: Arc::new(Mutex::new(port)),
        })
    }

    /// Device path this transport is bound to.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

#[async_trait]
impl WireTransport for SerialWire {
    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        let port = self.port.clone();
        let frame = frame.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = port.blocking_lock();
            guard
                .write_all(&frame)
                .context("failed to write to serial port")?;
            guard.flush().context("failed to flush serial port")?;
            Ok(())
        })
        .await
        .context("serial write task panicked")?
    }

    async fn read_line(&mut self) -> Result<String> {
        let port = self.port.clone();
        let deadline = self.timeout;

        tokio::task::spawn_blocking(move || -> Result<String> {
            let mut guard = port.blocking_lock();
            let mut line = String::new();
            let mut buf = [0u8; 1];
            let start = Instant::now();

            loop {
                if start.elapsed() > deadline {
                    // Timeout: hand back whatever arrived (possibly nothing)
                    // and let the protocol layer classify it.
                    return Ok(line);
                }

                match guard.read(&mut buf) {
                    Ok(1) => {
                        let ch = buf[0] as char;
                        if ch == '\n' || ch == '\r' {
                            return Ok(line);
                        }
                        line.push(ch);
                    }
                    Ok(0) => {
                        return Err(anyhow!("unexpected EOF from serial port"));
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                        // Port poll expired; keep waiting until the deadline.
                        continue;
                    }
                    Err(e) => {
                        return Err(anyhow!("serial read error: {e}"));
                    }
                    Ok(_) => return Err(anyhow!("single-byte read returned more than one byte")),
                }
            }
        })
        .await
        .context("serial read task panicked")?
    }
}
