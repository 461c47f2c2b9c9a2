//! Bridge configuration.
//!
//! Settings are loaded through Figment from a TOML file with environment
//! overrides, in order of precedence:
//!
//! 1. Environment variables prefixed with `REGBRIDGE_`
//! 2. The TOML configuration file
//!
//! # Example
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! timeout_ms = 1000
//!
//! [gpib]
//! board = 0
//! address = 9
//! timeout_ms = 11000
//! ```
//!
//! Nested keys are separated with a double underscore:
//!
//! ```text
//! REGBRIDGE_SERIAL__PORT=/dev/ttyACM1
//! REGBRIDGE_GPIB__ADDRESS=12
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment failed to read or deserialize the configuration sources.
    #[error("configuration load error: {0}")]
    Load(#[from] figment::Error),
    /// The configuration parsed but a value is semantically invalid.
    #[error("configuration validation error: {0}")]
    Validation(String),
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// UART serial session settings.
    #[serde(default)]
    pub serial: SerialSettings,
    /// GPIB instrument session settings.
    #[serde(default)]
    pub gpib: GpibSettings,
}

impl BridgeConfig {
    /// Load from `path` with `REGBRIDGE_` environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: BridgeConfig = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("REGBRIDGE_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check semantic constraints the deserializer cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.serial.validate()?;
        self.gpib.validate()
    }
}

/// Serial (UART) session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Serial device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    /// Baud rate, e.g. 115200.
    pub baud_rate: u32,
    /// Overall response read timeout in milliseconds. An exchange that
    /// produces no bytes within this window is classified as a timeout.
    pub timeout_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        SerialSettings {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            timeout_ms: 1000,
        }
    }
}

impl SerialSettings {
    /// Read timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.port.is_empty() {
            return Err(ConfigError::Validation("serial port must not be empty".into()));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::Validation("baud rate must be non-zero".into()));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "serial timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// GPIB instrument session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpibSettings {
    /// GPIB board (interface) index.
    pub board: u8,
    /// Primary address of the instrument on the bus (0..=30).
    pub address: u8,
    /// Protocol timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for GpibSettings {
    fn default() -> Self {
        GpibSettings {
            board: 0,
            address: 0,
            timeout_ms: 11_000,
        }
    }
}

impl GpibSettings {
    /// VISA resource string for this board/address pair.
    pub fn resource(&self) -> String {
        format!("GPIB{}::{}::INSTR", self.board, self.address)
    }

    /// Protocol timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.address > 30 {
            return Err(ConfigError::Validation(format!(
                "GPIB address {} out of range 0..=30",
                self.address
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Validation("GPIB timeout must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.gpib.resource(), "GPIB0::0::INSTR");
    }

    #[test]
    fn load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[serial]\nport = \"/dev/ttyACM0\"\nbaud_rate = 9600\ntimeout_ms = 500\n\n\
             [gpib]\nboard = 1\naddress = 9\ntimeout_ms = 2000"
        )
        .unwrap();

        let config = BridgeConfig::load_from(file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.timeout(), Duration::from_millis(500));
        assert_eq!(config.gpib.resource(), "GPIB1::9::INSTR");
    }

    #[test]
    fn invalid_gpib_address_is_rejected() {
        let config = BridgeConfig {
            gpib: GpibSettings {
                address: 42,
                ..GpibSettings::default()
            },
            ..BridgeConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn zero_baud_rate_is_rejected() {
        let config = BridgeConfig {
            serial: SerialSettings {
                baud_rate: 0,
                ..SerialSettings::default()
            },
            ..BridgeConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
