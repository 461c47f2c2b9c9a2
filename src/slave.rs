//! The memory-slave capability contract.
//!
//! A bridge registers with the surrounding memory framework as a slave: a
//! sink for transactions within a declared byte-size window. This trait is
//! the explicit Rust rendering of that role, and the only surface the
//! framework needs from a bridge.

use crate::error::Result;
use crate::transaction::Transaction;
use async_trait::async_trait;

/// A transaction sink backed by a wire protocol.
///
/// Implementations dispatch strictly in submission order, one transaction in
/// flight at a time, and resolve every accepted transaction exactly once.
#[async_trait]
pub trait MemorySlave: Send + Sync {
    /// Identifier used in log messages, typically the device path or
    /// instrument resource.
    fn name(&self) -> &str;

    /// Inclusive (min, max) transaction size in bytes this slave accepts.
    /// Transactions outside the window are resolved as errors without
    /// touching the wire.
    fn size_window(&self) -> (usize, usize);

    /// Enqueue a transaction for the worker. Returns immediately; the caller
    /// observes completion through [`Transaction::wait`].
    ///
    /// Fails with [`BridgeError::Stopped`](crate::BridgeError::Stopped) once
    /// the bridge has shut down; a rejected transaction is never dispatched
    /// and its outcome stays untouched by the bridge.
    fn submit(&self, transaction: Transaction) -> Result<()>;

    /// Stop the worker: enqueue the shutdown sentinel, wait for the worker
    /// to drain and exit, then release the wire session. Transactions queued
    /// before the sentinel complete normally; anything queued after it is
    /// resolved as an error. Safe to call more than once.
    async fn shutdown(&mut self) -> Result<()>;
}
