//! GPIB register bridge.
//!
//! Translates single-register transactions into SCPI-style text commands:
//! a write sends `"<key> <value>"` and expects no response (fire-and-forget
//! by design of this instrument class), a read sends `"<key>?"` and decodes
//! the textual reply through the register's codec.
//!
//! The mapping from register address to instrument parameter key and codec
//! is supplied up front through [`GpibBridgeBuilder`]; the map is immutable
//! once the worker starts, so lookups need no synchronization.

use crate::adapters::InstrumentPort;
use crate::bridges::{check_size_window, drain_after_shutdown, WorkerHandle, WorkerMsg};
use crate::codec::ValueCodec;
use crate::error::{BridgeError, Result};
use crate::slave::MemorySlave;
use crate::transaction::{Transaction, TransactionGuard, TransactionKind};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

#[cfg(feature = "instrument_visa")]
use crate::adapters::VisaPort;
#[cfg(feature = "instrument_visa")]
use crate::config::GpibSettings;

/// Smallest accepted transaction in bytes.
const MIN_SIZE: usize = 1;
/// Largest accepted transaction in bytes (covers raw serial-data registers).
const MAX_SIZE: usize = 4096;

/// Maps one register address to its instrument parameter and value codec.
pub struct RegisterDescriptor {
    /// Protocol-visible parameter name, e.g. `FREQ`.
    pub key: String,
    /// Byte/text conversion strategy for the register's declared width.
    pub codec: Arc<dyn ValueCodec>,
}

impl RegisterDescriptor {
    /// Declared register width in bytes, derived from the codec's bit size.
    pub fn byte_size(&self) -> usize {
        self.codec.byte_size()
    }
}

/// Builder collecting the register map before the worker starts.
pub struct GpibBridgeBuilder {
    name: String,
    registers: HashMap<u64, RegisterDescriptor>,
}

impl GpibBridgeBuilder {
    /// Register the parameter `key` with its value codec at `address`.
    /// Registering the same address twice replaces the earlier descriptor.
    pub fn register(
        mut self,
        address: u64,
        key: impl Into<String>,
        codec: Arc<dyn ValueCodec>,
    ) -> Self {
        let descriptor = RegisterDescriptor {
            key: key.into(),
            codec,
        };
        if self.registers.insert(address, descriptor).is_some() {
            warn!(
                "[{}] register at {address:#x} redefined before start",
                self.name
            );
        }
        self
    }

    /// Start the bridge over an already-open instrument port. The worker
    /// task takes exclusive ownership of the port and the register map.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<P>(self, port: P) -> GpibBridge
    where
        P: InstrumentPort + 'static,
    {
        let GpibBridgeBuilder { name, registers } = self;
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(name.clone(), port, registers, queue_rx));
        info!("[{name}] GPIB bridge started");
        GpibBridge {
            handle: WorkerHandle::new(name, queue_tx, worker),
        }
    }

    /// Open a VISA session for `settings` and start the bridge on it, named
    /// after the VISA resource.
    #[cfg(feature = "instrument_visa")]
    pub async fn start_visa(self, settings: &GpibSettings) -> anyhow::Result<GpibBridge> {
        let port = VisaPort::open(settings).await?;
        Ok(self.start(port))
    }
}

/// Memory slave speaking SCPI-style `key value` / `key?` text over GPIB.
pub struct GpibBridge {
    handle: WorkerHandle,
}

impl GpibBridge {
    /// Begin configuring a bridge; registers are added on the builder and
    /// frozen once the worker starts.
    pub fn builder(name: impl Into<String>) -> GpibBridgeBuilder {
        GpibBridgeBuilder {
            name: name.into(),
            registers: HashMap::new(),
        }
    }
}

#[async_trait]
impl MemorySlave for GpibBridge {
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

async fn run_worker<P: InstrumentPort>(
    name: String,
    mut port: P,
    registers: HashMap<u64, RegisterDescriptor>,
    mut queue_rx: mpsc::UnboundedReceiver<WorkerMsg>,
) {
    while let Some(msg) = queue_rx.recv().await {
        let transaction = match msg {
            WorkerMsg::Process(transaction) => transaction,
            WorkerMsg::Shutdown => break,
        };

        let mut guard = transaction.lock().await;
        match process(&name, &mut port, &registers, &mut guard).await {
            Ok(()) => guard.done(),
            Err(err) => {
                warn!("[{name}] {transaction:?} failed: {err}");
                guard.error(err.to_string());
            }
        }
    }
    drain_after_shutdown(&name, &mut queue_rx).await;
    // The instrument session drops here, after the queue is empty.
}

async fn process<P: InstrumentPort>(
    name: &str,
    port: &mut P,
    registers: &HashMap<u64, RegisterDescriptor>,
    guard: &mut TransactionGuard<'_>,
) -> Result<()> {
    check_size_window(guard.size(), MIN_SIZE, MAX_SIZE)?;

    // Unknown or mis-sized targets never touch the wire.
    let address = guard.address();
    let descriptor = registers
        .get(&address)
        .ok_or(BridgeError::UnknownAddress(address))?;
    let expected = descriptor.byte_size();
    if guard.size() != expected {
        return Err(BridgeError::SizeMismatch {
            got: guard.size(),
            expected,
        });
    }

    match guard.kind() {
        TransactionKind::Write => {
            let value = descriptor.codec.format(guard.data())?;
            let command = format!("{} {}", descriptor.key, value);
            debug!("[{name}] write: {command:?}");
            port.write(&command).await.map_err(BridgeError::wire)?;
            Ok(())
        }
        TransactionKind::Read | TransactionKind::Verify => {
            let query = format!("{}?", descriptor.key);
            debug!("[{name}] query: {query:?}");
            let reply = port
                .query(&query, expected * 2)
                .await
                .map_err(BridgeError::wire)?;
            let reply = reply.trim();
            if reply.is_empty() {
                return Err(BridgeError::Timeout {
                    word: 0,
                    request: query,
                });
            }
            debug!("[{name}] reply: {reply:?}");
            let bytes = descriptor.codec.parse(reply)?;
            guard.set_data(&bytes, 0);
            Ok(())
        }
        kind => Err(BridgeError::UnsupportedKind(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::UIntCodec;

    #[test]
    fn descriptor_byte_size_follows_codec() {
        let descriptor = RegisterDescriptor {
            key: "FREQ".to_string(),
            codec: Arc::new(UIntCodec::new(32)),
        };
        assert_eq!(descriptor.byte_size(), 4);
    }
}
