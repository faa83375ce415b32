//! Configuration management for the Flower Power driver
//!
//! Settings come from an optional TOML file, then environment overrides.
//! Every section has defaults matching the stock probe firmware.

use crate::client::gatt::{self, HandleRange};
use crate::error::{DriverError, Result};
use crate::error_recovery::ReconnectPolicy;
use crate::models::SensorKind;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Driver configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Calibration table sources
    pub calibration: CalibrationConfig,

    /// GATT handle layout and payload framing
    pub gatt: GattConfig,

    /// Reconnection backoff
    pub reconnect: ReconnectPolicy,
}

/// Where the calibration tables live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Directory holding the JSON tables
    pub data_dir: PathBuf,
    pub sunlight_file: String,
    pub moisture_file: String,
    pub temperature_file: String,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            sunlight_file: "sunlight.json".to_string(),
            moisture_file: "soil-moisture.json".to_string(),
            temperature_file: "temperature.json".to_string(),
        }
    }
}

impl CalibrationConfig {
    /// Full path of the table for `kind`
    pub fn path_for(&self, kind: SensorKind) -> PathBuf {
        let file = match kind {
            SensorKind::Sunlight => &self.sunlight_file,
            SensorKind::Moisture => &self.moisture_file,
            SensorKind::Temperature => &self.temperature_file,
        };
        self.data_dir.join(file)
    }
}

/// GATT handle layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GattConfig {
    /// Bytes skipped before the little-endian value, on every decode path
    pub payload_offset: usize,

    pub sunlight_handle: u16,
    pub moisture_handle: u16,
    pub temperature_handle: u16,
    pub battery_handle: u16,

    /// Notify ranges, also used for routing notifications
    pub sunlight_range: HandleRange,
    pub moisture_range: HandleRange,
    pub temperature_range: HandleRange,

    /// Vendor command switching the probe into live mode
    pub live_mode_payload: Vec<u8>,
}

impl Default for GattConfig {
    fn default() -> Self {
        Self {
            payload_offset: 0,
            sunlight_handle: gatt::SUNLIGHT_HANDLE,
            moisture_handle: gatt::MOISTURE_HANDLE,
            temperature_handle: gatt::TEMPERATURE_HANDLE,
            battery_handle: gatt::BATTERY_HANDLE,
            sunlight_range: HandleRange::around(gatt::SUNLIGHT_HANDLE),
            moisture_range: HandleRange::around(gatt::MOISTURE_HANDLE),
            temperature_range: HandleRange::around(gatt::TEMPERATURE_HANDLE),
            live_mode_payload: gatt::LIVE_MODE_PAYLOAD.to_vec(),
        }
    }
}

impl GattConfig {
    /// Value handle read by the polled accessors
    pub fn value_handle(&self, kind: SensorKind) -> u16 {
        match kind {
            SensorKind::Sunlight => self.sunlight_handle,
            SensorKind::Moisture => self.moisture_handle,
            SensorKind::Temperature => self.temperature_handle,
        }
    }

    /// Notify range subscribed for `kind`
    pub fn range_for(&self, kind: SensorKind) -> HandleRange {
        match kind {
            SensorKind::Sunlight => self.sunlight_range,
            SensorKind::Moisture => self.moisture_range,
            SensorKind::Temperature => self.temperature_range,
        }
    }

    /// Sensor kind whose notify range contains `handle`
    pub fn kind_for_handle(&self, handle: u16) -> Option<SensorKind> {
        SensorKind::ALL
            .into_iter()
            .find(|kind| self.range_for(*kind).contains(handle))
    }

    fn validate(&self) -> Result<()> {
        for kind in SensorKind::ALL {
            let range = self.range_for(kind);
            if !range.is_valid() {
                return Err(DriverError::config(format!(
                    "{kind} handle range {range} is empty"
                )));
            }
            if !range.contains(self.value_handle(kind)) {
                return Err(DriverError::config(format!(
                    "{kind} value handle {} lies outside its range {range}",
                    self.value_handle(kind)
                )));
            }
        }

        let [a, b, c] = SensorKind::ALL.map(|kind| self.range_for(kind));
        if a.overlaps(&b) || b.overlaps(&c) || a.overlaps(&c) {
            return Err(DriverError::config("Sensor handle ranges must not overlap"));
        }

        if self.live_mode_payload.is_empty() {
            return Err(DriverError::config("Live mode payload cannot be empty"));
        }

        Ok(())
    }
}

impl DriverConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DriverError::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Resolve the effective configuration: file (if any), then environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(dir) = env::var("FLOWERPOWER_DATA_DIR") {
            self.calibration.data_dir = PathBuf::from(dir);
        }

        if let Ok(offset) = env::var("FLOWERPOWER_PAYLOAD_OFFSET") {
            self.gatt.payload_offset = offset.parse().map_err(|e| {
                DriverError::config(format!("Invalid FLOWERPOWER_PAYLOAD_OFFSET: {}", e))
            })?;
        }

        if let Ok(attempts) = env::var("FLOWERPOWER_RECONNECT_MAX_ATTEMPTS") {
            self.reconnect.max_attempts = attempts.parse().map_err(|e| {
                DriverError::config(format!("Invalid FLOWERPOWER_RECONNECT_MAX_ATTEMPTS: {}", e))
            })?;
        }

        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.gatt.validate()?;
        self.reconnect.validate()?;
        Ok(())
    }
}
