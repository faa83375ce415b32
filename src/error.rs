//! Error types for the Flower Power driver
//!
//! Errors are split by how far they are allowed to travel: calibration load
//! failures halt startup, everything else degrades to "no reading this cycle"
//! at the device session boundary.

use crate::models::SensorKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, DriverError>;

/// Error types for Flower Power driver operations
#[derive(Error, Debug)]
pub enum DriverError {
    /// Calibration source missing or corrupt
    #[error("Calibration data unavailable for {kind}: {reason}")]
    DataUnavailable { kind: SensorKind, reason: String },

    /// Post-clamp reading has no calibration entry
    #[error("No calibration entry for {kind} reading {key}")]
    KeyNotFound { kind: SensorKind, key: u16 },

    /// Malformed or short notification payload
    #[error("Decode error: {0}")]
    Decode(String),

    /// Connect/read/subscribe failure reported by the BLE stack
    #[error("Transport error: {0}")]
    Transport(String),

    /// Connect attempt for an address that is already active
    #[error("Device already active: {0}")]
    DuplicateDevice(String),

    /// Hub sink refused an export or publication
    #[error("Hub sink error: {0}")]
    Sink(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// How bad an error is for the running driver
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Expected noise, e.g. duplicate discovery
    Info,
    /// Reading or operation dropped, driver keeps going
    Warning,
    /// Operation failed and needs attention
    Error,
    /// Driver cannot start
    Critical,
}

impl DriverError {
    /// Create a data unavailable error
    pub fn data_unavailable<S: Into<String>>(kind: SensorKind, reason: S) -> Self {
        Self::DataUnavailable {
            kind,
            reason: reason.into(),
        }
    }

    /// Create a key not found error
    pub fn key_not_found(kind: SensorKind, key: u16) -> Self {
        Self::KeyNotFound { kind, key }
    }

    /// Create a decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a duplicate device error
    pub fn duplicate_device<S: Into<String>>(address: S) -> Self {
        Self::DuplicateDevice(address.into())
    }

    /// Create a sink error
    pub fn sink<S: Into<String>>(msg: S) -> Self {
        Self::Sink(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Severity of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::DataUnavailable { .. } | Self::Config(_) => ErrorSeverity::Critical,
            Self::DuplicateDevice(_) => ErrorSeverity::Info,
            Self::KeyNotFound { .. } | Self::Decode(_) | Self::Transport(_) | Self::Sink(_) => {
                ErrorSeverity::Warning
            }
            Self::InvalidInput(_) | Self::Io(_) | Self::Json(_) | Self::Toml(_) => {
                ErrorSeverity::Error
            }
        }
    }

    /// Whether the driver must stop because of this error
    pub fn is_fatal(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Whether retrying the failed operation can help
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Io(_))
    }

    /// Stable, machine-readable category name
    pub fn category(&self) -> &'static str {
        match self {
            Self::DataUnavailable { .. } | Self::KeyNotFound { .. } => "calibration",
            Self::Decode(_) => "decode",
            Self::Transport(_) | Self::DuplicateDevice(_) => "transport",
            Self::Sink(_) => "sink",
            Self::Config(_) | Self::Toml(_) => "config",
            Self::InvalidInput(_) => "input",
            Self::Io(_) | Self::Json(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_load_failure_is_fatal() {
        let err = DriverError::data_unavailable(SensorKind::Temperature, "missing file");
        assert!(err.is_fatal());
        assert_eq!(err.category(), "calibration");
        assert_eq!(
            err.to_string(),
            "Calibration data unavailable for temperature: missing file"
        );
    }

    #[test]
    fn test_reading_errors_are_not_fatal() {
        let errors = [
            DriverError::key_not_found(SensorKind::Moisture, 333),
            DriverError::decode("short payload"),
            DriverError::transport("link lost"),
            DriverError::duplicate_device("AA:BB:CC:DD:EE:FF"),
        ];
        for err in &errors {
            assert!(!err.is_fatal(), "{err} should not be fatal");
        }
    }

    #[test]
    fn test_only_transport_errors_retry() {
        assert!(DriverError::transport("timeout").is_retryable());
        assert!(!DriverError::decode("bad").is_retryable());
        assert!(!DriverError::key_not_found(SensorKind::Sunlight, 10).is_retryable());
    }
}
