//! Register transactions and their lifecycle.
//!
//! A [`Transaction`] represents one pending access to a byte-addressed
//! register space: a read, write or verify of `size` bytes at `address`.
//! The caller constructs it, submits it to a bridge and later awaits the
//! [`Outcome`]; the bridge worker borrows it under an exclusive lock for the
//! duration of the wire exchange and resolves it exactly once.
//!
//! The handle is a cheap clone (`Arc` inner) so the caller can keep one side
//! while the worker queue owns the other. Payload and outcome live behind a
//! single async mutex, which is the per-transaction lock of the design: the
//! worker holds it across the whole resolution, so a caller polling the
//! outcome can never observe a half-written payload.

use log::warn;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, MutexGuard};

/// The access type of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    /// Read `size` bytes from the register space into the payload.
    Read,
    /// Write the payload to the register space, awaiting acknowledgment.
    Write,
    /// Read back for verification; wire behavior is identical to `Read`,
    /// the comparison against expected data is the caller's concern.
    Verify,
    /// Write without acknowledgment. Not supported by these bridges.
    Posted,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionKind::Read => "read",
            TransactionKind::Write => "write",
            TransactionKind::Verify => "verify",
            TransactionKind::Posted => "posted write",
        };
        f.write_str(name)
    }
}

/// Resolution state of a transaction. Terminal states are set exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not yet dispatched or still on the wire.
    Pending,
    /// Completed successfully; for reads the payload holds the result bytes.
    Done,
    /// Failed with a diagnostic message.
    Error(String),
}

impl Outcome {
    /// True once the transaction has been resolved either way.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Pending)
    }

    /// True if the transaction completed successfully.
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done)
    }

    /// The error diagnostic, if the transaction failed.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Outcome::Error(msg) => Some(msg),
            _ => None,
        }
    }
}

struct Body {
    payload: Vec<u8>,
    outcome: Outcome,
}

struct Inner {
    address: u64,
    size: usize,
    kind: TransactionKind,
    body: Mutex<Body>,
    // Signals terminal outcome to `wait()`; the value itself is unused.
    completed: watch::Sender<bool>,
}

/// One pending register access with its own outcome.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<Inner>,
}

impl Transaction {
    fn new(kind: TransactionKind, address: u64, payload: Vec<u8>) -> Self {
        let (completed, _) = watch::channel(false);
        Transaction {
            inner: Arc::new(Inner {
                address,
                size: payload.len(),
                kind,
                body: Mutex::new(Body {
                    payload,
                    outcome: Outcome::Pending,
                }),
                completed,
            }),
        }
    }

    /// A write of `payload` to `address`. The transaction size is the
    /// payload length.
    pub fn write(address: u64, payload: Vec<u8>) -> Self {
        Self::new(TransactionKind::Write, address, payload)
    }

    /// A read of `size` bytes at `address`. The payload starts zeroed and is
    /// filled by the bridge.
    pub fn read(address: u64, size: usize) -> Self {
        Self::new(TransactionKind::Read, address, vec![0; size])
    }

    /// A verify read of `size` bytes at `address`.
    pub fn verify(address: u64, size: usize) -> Self {
        Self::new(TransactionKind::Verify, address, vec![0; size])
    }

    /// A posted (unacknowledged) write. Both bridges reject this kind; the
    /// constructor exists so callers hit the documented error path instead
    /// of undefined behavior.
    pub fn posted(address: u64, payload: Vec<u8>) -> Self {
        Self::new(TransactionKind::Posted, address, payload)
    }

    /// Byte address targeted by this transaction.
    pub fn address(&self) -> u64 {
        self.inner.address
    }

    /// Size of the access in bytes.
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Access type.
    pub fn kind(&self) -> TransactionKind {
        self.inner.kind
    }

    /// Acquire the per-transaction exclusive lock.
    ///
    /// The bridge worker holds the guard for the whole wire exchange;
    /// callers normally only need [`Transaction::wait`].
    pub async fn lock(&self) -> TransactionGuard<'_> {
        TransactionGuard {
            inner: &self.inner,
            body: self.inner.body.lock().await,
        }
    }

    /// Snapshot of the current outcome.
    pub async fn outcome(&self) -> Outcome {
        self.inner.body.lock().await.outcome.clone()
    }

    /// Snapshot of the payload. For resolved reads this is the data fetched
    /// from the device.
    pub async fn payload(&self) -> Vec<u8> {
        self.inner.body.lock().await.payload.clone()
    }

    /// Wait until the transaction reaches a terminal outcome and return it.
    pub async fn wait(&self) -> Outcome {
        let mut rx = self.inner.completed.subscribe();
        loop {
            {
                let body = self.inner.body.lock().await;
                if body.outcome.is_terminal() {
                    return body.outcome.clone();
                }
            }
            if rx.changed().await.is_err() {
                // Sender lives in our own Arc, so this cannot happen while
                // `self` is alive; bail out with whatever state we hold.
                return self.inner.body.lock().await.outcome.clone();
            }
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("address", &format_args!("{:#x}", self.inner.address))
            .field("size", &self.inner.size)
            .field("kind", &self.inner.kind)
            .finish()
    }
}

/// Scoped exclusive access to a transaction's payload and resolution.
pub struct TransactionGuard<'a> {
    inner: &'a Inner,
    body: MutexGuard<'a, Body>,
}

impl TransactionGuard<'_> {
    /// Byte address targeted by this transaction.
    pub fn address(&self) -> u64 {
        self.inner.address
    }

    /// Size of the access in bytes.
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Access type.
    pub fn kind(&self) -> TransactionKind {
        self.inner.kind
    }

    /// The payload buffer (caller-supplied data for writes, result buffer
    /// for reads).
    pub fn data(&self) -> &[u8] {
        &self.body.payload
    }

    /// Copy `src` into the payload at `offset`. Bytes that would fall past
    /// the end of the payload are dropped; workers compute offsets from the
    /// transaction size, so truncation indicates a protocol bug upstream.
    pub fn set_data(&mut self, src: &[u8], offset: usize) {
        let len = self.body.payload.len();
        if offset >= len {
            warn!(
                "set_data offset {offset} past payload end {len}, dropping {} bytes",
                src.len()
            );
            return;
        }
        let n = src.len().min(len - offset);
        if n < src.len() {
            warn!("set_data truncated {} of {} bytes", src.len() - n, src.len());
        }
        self.body.payload[offset..offset + n].copy_from_slice(&src[..n]);
    }

    /// Resolve the transaction as successful.
    pub fn done(&mut self) {
        self.resolve(Outcome::Done);
    }

    /// Resolve the transaction as failed with a diagnostic message.
    pub fn error(&mut self, message: impl Into<String>) {
        self.resolve(Outcome::Error(message.into()));
    }

    fn resolve(&mut self, outcome: Outcome) {
        if self.body.outcome.is_terminal() {
            warn!(
                "transaction at {:#x} already resolved as {:?}, ignoring {:?}",
                self.inner.address, self.body.outcome, outcome
            );
            return;
        }
        self.body.outcome = outcome;
        // Wakes every waiter; late subscribers see the terminal outcome
        // through the lock before they ever await a change.
        let _ = self.inner.completed.send(true);
    }
}
