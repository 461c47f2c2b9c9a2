//! Error types for the bridge crate.
//!
//! `BridgeError` covers the whole failure taxonomy of both wire protocols:
//! unknown targets, size violations, wire timeouts, malformed responses and
//! unsupported transaction kinds. Every variant renders to the diagnostic
//! message that ends up attached to the failing transaction; the worker loops
//! themselves never propagate these errors further.

use crate::transaction::TransactionKind;
use thiserror::Error;

/// Convenience alias for results using the bridge error type.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Failure modes of a single register transaction.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The wire returned nothing before the configured read timeout.
    #[error("empty response (likely timeout) for word {word} of request {request:?}")]
    Timeout {
        /// Index of the 32-bit word (or 0 for single-register protocols) that timed out.
        word: usize,
        /// The request that was on the wire when the timeout occurred.
        request: String,
    },

    /// The wire returned a line that does not match the expected grammar.
    #[error("malformed response for word {word}: {response:?} to request {request:?}")]
    MalformedResponse {
        /// Index of the 32-bit word whose response failed validation.
        word: usize,
        /// The request that produced the response.
        request: String,
        /// The raw response line as received.
        response: String,
    },

    /// No register descriptor is registered for the transaction address.
    #[error("unknown address: {0:#x}")]
    UnknownAddress(u64),

    /// Transaction size disagrees with the register's declared byte width.
    #[error("transaction size mismatch: got {got}, expected {expected}")]
    SizeMismatch {
        /// Size requested by the transaction.
        got: usize,
        /// Byte width declared by the register's codec.
        expected: usize,
    },

    /// Transaction size falls outside the bridge's accepted window.
    #[error("transaction size {size} outside accepted window {min}..={max}")]
    SizeWindow {
        /// Size requested by the transaction.
        size: usize,
        /// Smallest accepted size in bytes.
        min: usize,
        /// Largest accepted size in bytes.
        max: usize,
    },

    /// Word-oriented protocols require the size to be 32-bit aligned.
    #[error("transaction size {0} is not a multiple of 4")]
    UnalignedSize(usize),

    /// Transaction kind the bridge does not implement (posted writes).
    #[error("unsupported transaction type: {0}")]
    UnsupportedKind(TransactionKind),

    /// Value conversion between register bytes and wire text failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// The underlying transport reported an I/O failure.
    #[error("wire error: {0}")]
    Wire(String),

    /// The bridge worker has already been shut down.
    #[error("bridge has been stopped")]
    Stopped,
}

impl BridgeError {
    /// Wrap a transport-layer failure, flattening the anyhow context chain.
    pub fn wire(err: anyhow::Error) -> Self {
        BridgeError::Wire(format!("{err:#}"))
    }
}
