//! VISA-backed instrument port for GPIB devices.
//!
//! Wraps the `visa-rs` crate and provides async I/O by executing the
//! synchronous VISA calls on Tokio's blocking task executor, the same shape
//! as the serial transport. Resource strings follow the VISA convention,
//! e.g. `GPIB0::9::INSTR` (see [`GpibSettings::resource`]).
//!
//! [`GpibSettings::resource`]: crate::config::GpibSettings::resource

use crate::config::GpibSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use visa_rs::{DefaultRM, Instrument, VISA};

use super::InstrumentPort;

/// GPIB instrument session over VISA.
pub struct VisaPort {
    resource: String,
    timeout: Duration,
    instrument: Arc<Mutex<Box<dyn Instrument>>>,
}

impl VisaPort {
    /// Open the instrument described by `settings`.
    pub async fn open(settings: &GpibSettings) -> Result<Self> {
        let resource = settings.resource();
        let timeout = settings.timeout();
        let resource_for_open = resource.clone();
        let timeout_ms = timeout.as_millis() as u32;

        let instrument = tokio::task::spawn_blocking(move || {
            let rm = DefaultRM::new().context("failed to create VISA resource manager")?;
            let instr = rm
                .open(&resource_for_open, timeout_ms, 0)
                .with_context(|| format!("failed to open VISA resource: {resource_for_open}"))?;
            Ok::<Box<dyn Instrument>, anyhow::Error>(instr)
        })
        .await
        .context("VISA open task panicked")??;

        debug!("VISA resource '{resource}' opened with {timeout_ms}ms timeout");

        Ok(VisaPort {
            resource,
            timeout,
            instrument: Arc::new(Mutex::new(instrument)),
        })
    }

    /// VISA resource string this port is bound to.
    pub fn resource(&self) -> &str {
        &self.resource
    }
}

#[async_trait]
impl InstrumentPort for VisaPort {
    async fn write(&mut self, message: &str) -> Result<()> {
        let instrument = self.instrument.clone();
        let message = message.to_string();
        let timeout_ms = self.timeout.as_millis() as u32;

        tokio::task::spawn_blocking(move || {
            let mut guard = instrument.blocking_lock();
            guard
                .set_timeout(timeout_ms)
                .context("failed to set VISA timeout")?;
            guard
                .write(&message)
                .with_context(|| format!("VISA write failed for: {message}"))?;
            debug!("VISA write sent: {message}");
            Ok(())
        })
        .await
        .context("VISA write task panicked")?
    }

    async fn query(&mut self, message: &str, max_len: usize) -> Result<String> {
        let instrument = self.instrument.clone();
        let message = message.to_string();
        let timeout_ms = self.timeout.as_millis() as u32;

        tokio::task::spawn_blocking(move || {
            let mut guard = instrument.blocking_lock();
            guard
                .set_timeout(timeout_ms)
                .context("failed to set VISA timeout")?;
            let response = guard
                .query(&message)
                .with_context(|| format!("VISA query failed for: {message}"))?;
            let mut response = response.trim().to_string();
            response.truncate(max_len);
            debug!("VISA query '{message}' -> '{response}'");
            Ok(response)
        })
        .await
        .context("VISA query task panicked")?
    }
}
