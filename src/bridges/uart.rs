//! UART register bridge.
//!
//! Translates byte-range read/write transactions into the 32-bit-word
//! hex-text line protocol:
//!
//! ```text
//! write request : "w 00001000 deadbeef \n"
//! write response: "w 00001000 deadbeef \n"
//! read  request : "r 00001000 \n"
//! read  response: "r 00001000 deadbeef \n"
//! ```
//!
//! A transaction covering more than one 32-bit word is split into one
//! exchange per word. Each response must echo the verb and the word's
//! address; an empty line is classified as a timeout. The first failing
//! word aborts the remaining words of that transaction on both the write
//! and the read path.

use crate::adapters::WireTransport;
use crate::bridges::{check_size_window, drain_after_shutdown, WorkerHandle, WorkerMsg};
use crate::error::{BridgeError, Result};
use crate::slave::MemorySlave;
use crate::transaction::{Transaction, TransactionGuard, TransactionKind};
use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::mpsc;

#[cfg(feature = "instrument_serial")]
use crate::adapters::SerialWire;
#[cfg(feature = "instrument_serial")]
use crate::config::SerialSettings;

/// Wire word size in bytes; every exchange moves one 32-bit word.
const WORD: usize = 4;

/// Smallest accepted transaction: one word.
const MIN_SIZE: usize = 4;
/// Largest accepted transaction in bytes.
const MAX_SIZE: usize = 4096;

/// Memory slave speaking the hex-word UART line protocol.
pub struct UartBridge {
    handle: WorkerHandle,
}

impl UartBridge {
    /// Start a bridge over an already-open transport. The worker task takes
    /// exclusive ownership of the wire and runs until [`shutdown`].
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// [`shutdown`]: MemorySlave::shutdown
    pub fn new<W>(name: impl Into<String>, wire: W) -> Self
    where
        W: WireTransport + 'static,
    {
        let name = name.into();
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(name.clone(), wire, queue_rx));
        info!("[{name}] UART bridge started");
        UartBridge {
            handle: WorkerHandle::new(name, queue_tx, worker),
        }
    }

    /// Open the serial device described by `settings` and start a bridge on
    /// it, named after the device path.
    #[cfg(feature = "instrument_serial")]
    pub fn open(settings: &SerialSettings) -> anyhow::Result<Self> {
        let wire = SerialWire::open(settings)?;
        Ok(Self::new(settings.port.clone(), wire))
    }
}

#[async_trait]
impl MemorySlave for UartBridge {
    fn name(&self) -> &str {
        self.handle.name()
    }

    fn size_window(&self) -> (usize, usize) {
        (MIN_SIZE, MAX_SIZE)
    }

    fn submit(&self, transaction: Transaction) -> Result<()> {
        self.handle.submit(transaction)
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.handle.shutdown().await
    }
}

async fn run_worker<W: WireTransport>(
    name: String,
    mut wire: W,
    mut queue_rx: mpsc::UnboundedReceiver<WorkerMsg>,
) {
    while let Some(msg) = queue_rx.recv().await {
        let transaction = match msg {
            WorkerMsg::Process(transaction) => transaction,
            WorkerMsg::Shutdown => break,
        };

        let mut guard = transaction.lock().await;
        match process(&name, &mut wire, &mut guard).await {
            Ok(()) => guard.done(),
            Err(err) => {
                warn!("[{name}] {transaction:?} failed: {err}");
                guard.error(err.to_string());
            }
        }
    }
    drain_after_shutdown(&name, &mut queue_rx).await;
    // The wire session drops here, after the queue is empty.
}

async fn process<W: WireTransport>(
    name: &str,
    wire: &mut W,
    guard: &mut TransactionGuard<'_>,
) -> Result<()> {
    let size = guard.size();
    check_size_window(size, MIN_SIZE, MAX_SIZE)?;
    if size % WORD != 0 {
        return Err(BridgeError::UnalignedSize(size));
    }

    let address = guard.address();
    match guard.kind() {
        TransactionKind::Write => {
            let words: Vec<u32> = guard
                .data()
                .chunks_exact(WORD)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();

            for (word, data) in words.into_iter().enumerate() {
                let addr = address + (word * WORD) as u64;
                let request = format!("w {addr:08x} {data:08x} \n");
                exchange(name, wire, word, &request, 'w', addr).await?;
            }
            Ok(())
        }
        TransactionKind::Read | TransactionKind::Verify => {
            for word in 0..size / WORD {
                let addr = address + (word * WORD) as u64;
                let request = format!("r {addr:08x} \n");
                let data = exchange(name, wire, word, &request, 'r', addr).await?;
                guard.set_data(&data.to_le_bytes(), word * WORD);
            }
            Ok(())
        }
        kind => Err(BridgeError::UnsupportedKind(kind)),
    }
}

/// Send one request line and validate the echoed response. Returns the data
/// word from the response (the echo for writes, the register value for
/// reads).
async fn exchange<W: WireTransport>(
    name: &str,
    wire: &mut W,
    word: usize,
    request: &str,
    verb: char,
    addr: u64,
) -> Result<u32> {
    debug!("[{name}] word {word} request: {request:?}");
    wire.send(request.as_bytes()).await.map_err(BridgeError::wire)?;

    let response = wire.read_line().await.map_err(BridgeError::wire)?;
    if response.trim().is_empty() {
        return Err(BridgeError::Timeout {
            word,
            request: request.to_string(),
        });
    }
    debug!("[{name}] word {word} response: {response:?}");
    parse_response(&response, verb, addr).ok_or_else(|| BridgeError::MalformedResponse {
        word,
        request: request.to_string(),
        response,
    })
}

/// Validate a response line against the expected verb and address echo and
/// extract its data word. The grammar is `<verb> <addr> <data>` with an
/// optional trailing status token.
fn parse_response(response: &str, verb: char, addr: u64) -> Option<u32> {
    let tokens: Vec<&str> = response.split_whitespace().collect();
    if tokens.len() < 3 || tokens.len() > 4 {
        return None;
    }
    if !tokens[0].eq_ignore_ascii_case(&verb.to_string()) {
        return None;
    }
    if u64::from_str_radix(tokens[1], 16).ok()? != addr {
        return None;
    }
    u32::from_str_radix(tokens[2], 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_canonical_response() {
        assert_eq!(
            parse_response("w 00001000 deadbeef", 'w', 0x1000),
            Some(0xdead_beef)
        );
    }

    #[test]
    fn parse_accepts_trailing_status_token() {
        assert_eq!(parse_response("r 00002000 0000002a OK", 'r', 0x2000), Some(0x2a));
    }

    #[test]
    fn parse_is_case_insensitive_on_verb() {
        assert_eq!(parse_response("W 00001000 00000001", 'w', 0x1000), Some(1));
    }

    #[test]
    fn parse_rejects_wrong_verb() {
        assert_eq!(parse_response("r 00001000 00000001", 'w', 0x1000), None);
    }

    #[test]
    fn parse_rejects_address_echo_mismatch() {
        assert_eq!(parse_response("w 00001004 00000001", 'w', 0x1000), None);
    }

    #[test]
    fn parse_rejects_wrong_token_count() {
        assert_eq!(parse_response("w 00001000", 'w', 0x1000), None);
        assert_eq!(parse_response("w 00001000 1 2 3", 'w', 0x1000), None);
    }

    #[test]
    fn parse_rejects_non_hex_fields() {
        assert_eq!(parse_response("w zzzz 00000001", 'w', 0x1000), None);
        assert_eq!(parse_response("w 00001000 zzzz", 'w', 0x1000), None);
    }
}
