//! Protocol bridges.
//!
//! Each bridge pairs a single-consumer worker task with one exclusively
//! owned wire session. Callers hand transactions to the worker through a
//! FIFO queue; the worker resolves them strictly in submission order, one at
//! a time, because neither wire protocol multiplexes: response order is the
//! only correlation mechanism.

pub mod gpib;
pub mod uart;

pub use gpib::{GpibBridge, GpibBridgeBuilder, RegisterDescriptor};
pub use uart::UartBridge;

use crate::error::{BridgeError, Result};
use crate::transaction::Transaction;
use log::{debug, info};
use tokio::sync::mpsc;

/// Message on a bridge worker queue: a transaction to process or the
/// shutdown sentinel.
pub(crate) enum WorkerMsg {
    Process(Transaction),
    Shutdown,
}

/// Sending half of a worker queue plus the join handle of its worker task.
///
/// Owns the submit/shutdown mechanics both bridges share; the protocol
/// workers themselves live in [`uart`] and [`gpib`].
pub(crate) struct WorkerHandle {
    name: String,
    queue_tx: mpsc::UnboundedSender<WorkerMsg>,
    worker: Option<tokio::task::JoinHandle<()>>,
}

impl WorkerHandle {
    pub(crate) fn new(
        name: String,
        queue_tx: mpsc::UnboundedSender<WorkerMsg>,
        worker: tokio::task::JoinHandle<()>,
    ) -> Self {
        WorkerHandle {
            name,
            queue_tx,
            worker: Some(worker),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Non-blocking FIFO enqueue. Fails once the worker has exited.
    pub(crate) fn submit(&self, transaction: Transaction) -> Result<()> {
        debug!("[{}] enqueue {:?}", self.name, transaction);
        self.queue_tx
            .send(WorkerMsg::Process(transaction))
            .map_err(|_| BridgeError::Stopped)
    }

    /// Enqueue the sentinel and wait for the worker to drain and exit.
    /// Subsequent calls are no-ops.
    pub(crate) async fn shutdown(&mut self) -> Result<()> {
        // A closed queue just means the worker is already gone.
        let _ = self.queue_tx.send(WorkerMsg::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
            info!("[{}] bridge stopped", self.name);
        }
        Ok(())
    }
}

/// Resolve everything still queued behind the shutdown sentinel so no
/// caller is left waiting on a transaction that will never be dispatched.
pub(crate) async fn drain_after_shutdown(name: &str, rx: &mut mpsc::UnboundedReceiver<WorkerMsg>) {
    rx.close();
    while let Ok(msg) = rx.try_recv() {
        if let WorkerMsg::Process(transaction) = msg {
            debug!("[{name}] rejecting {transaction:?} queued after shutdown");
            transaction.lock().await.error("bridge stopped before dispatch");
        }
    }
}

/// Check a transaction size against the bridge's accepted window.
pub(crate) fn check_size_window(size: usize, min: usize, max: usize) -> Result<()> {
    if size < min || size > max {
        return Err(BridgeError::SizeWindow { size, min, max });
    }
    Ok(())
}
