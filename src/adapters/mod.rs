//! Wire transport implementations.
//!
//! This module holds the low-level I/O abstraction the bridges run on: a
//! line-oriented [`WireTransport`] for the UART register protocol and a
//! message-oriented [`InstrumentPort`] for GPIB-class instruments, plus the
//! concrete serial/VISA implementations and in-memory mocks for tests.
//!
//! Transport methods return `anyhow::Result`; the bridge workers convert
//! failures into per-transaction diagnostics.

pub mod mock;
#[cfg(feature = "instrument_serial")]
pub mod serial;
#[cfg(feature = "instrument_visa")]
pub mod visa;

use anyhow::Result;
use async_trait::async_trait;

pub use mock::{MockPort, MockWire};
#[cfg(feature = "instrument_serial")]
pub use serial::SerialWire;
#[cfg(feature = "instrument_visa")]
pub use visa::VisaPort;

/// A byte stream carrying newline-terminated text frames (UART).
///
/// The transport is exclusively owned by one bridge worker; implementations
/// do not need interior synchronization beyond what their backend requires.
#[async_trait]
pub trait WireTransport: Send {
    /// Transmit one request frame as-is (the caller includes the terminator).
    async fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Read one response line, stopping at `\n` or `\r`. Returns the line
    /// without its terminator. An empty string means nothing arrived within
    /// the transport's read timeout; the caller classifies that as a
    /// protocol timeout rather than an I/O error.
    async fn read_line(&mut self) -> Result<String>;
}

/// A command/response channel to a GPIB-class instrument.
#[async_trait]
pub trait InstrumentPort: Send {
    /// Send a command expecting no response (fire-and-forget writes).
    async fn write(&mut self, message: &str) -> Result<()>;

    /// Send a query and read back at most `max_len` bytes of response text.
    /// An empty string means the instrument produced nothing before the
    /// protocol timeout.
    async fn query(&mut self, message: &str, max_len: usize) -> Result<String>;
}
