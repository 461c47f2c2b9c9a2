//! Register-transaction to wire-protocol bridges.
//!
//! This crate turns asynchronous memory transactions (reads, writes and
//! verifies against a byte-addressed register space) into textual line
//! protocols carried over a physical or virtual stream, and parses the
//! responses back. Two peer bridges implement the same architecture:
//!
//! - [`UartBridge`]: 32-bit-word hex-text frames over a serial line
//!   (`w 00001000 deadbeef \n` / `r 00001000 \n`).
//! - [`GpibBridge`]: SCPI-style `key value` / `key?` text to a GPIB-class
//!   instrument, with per-register value codecs.
//!
//! Each bridge owns one worker task and one wire session. Transactions are
//! dispatched strictly in submission order with exactly one in flight,
//! because neither protocol multiplexes: response order is the only way to
//! correlate replies. Failures (timeouts, malformed responses, unknown
//! registers, size violations) resolve the affected transaction with a
//! diagnostic and never terminate the worker.
//!
//! # Example
//!
//! ```no_run
//! use regbridge::{MemorySlave, SerialSettings, Transaction, UartBridge};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let mut bridge = UartBridge::open(&SerialSettings::default())?;
//!
//! let write = Transaction::write(0x1000, 0xdead_beef_u32.to_le_bytes().to_vec());
//! bridge.submit(write.clone())?;
//! assert!(write.wait().await.is_done());
//!
//! bridge.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod bridges;
pub mod codec;
pub mod config;
pub mod error;
pub mod slave;
pub mod transaction;

pub use bridges::{GpibBridge, GpibBridgeBuilder, RegisterDescriptor, UartBridge};
pub use codec::{byte_count, AsciiCodec, BoolCodec, FloatCodec, IntCodec, UIntCodec, ValueCodec};
pub use config::{BridgeConfig, ConfigError, GpibSettings, SerialSettings};
pub use error::{BridgeError, Result};
pub use slave::MemorySlave;
pub use transaction::{Outcome, Transaction, TransactionGuard, TransactionKind};
