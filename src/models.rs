//! Domain models shared across the driver
//!
//! Sensor kinds, readings and the device descriptor exported to the hub.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::DriverError;

/// Calibrated sensor kinds exposed by a Flower Power probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Sunlight,
    Moisture,
    Temperature,
}

impl SensorKind {
    /// Every calibrated kind, in subscription order
    pub const ALL: [SensorKind; 3] = [
        SensorKind::Sunlight,
        SensorKind::Moisture,
        SensorKind::Temperature,
    ];

    /// Hub channel carrying readings of this kind
    pub fn channel(self) -> ChannelKind {
        match self {
            SensorKind::Sunlight => ChannelKind::Illuminance,
            SensorKind::Moisture => ChannelKind::Moisture,
            SensorKind::Temperature => ChannelKind::Temperature,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SensorKind::Sunlight => "sunlight",
            SensorKind::Moisture => "moisture",
            SensorKind::Temperature => "temperature",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorKind {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sunlight" | "light" | "illuminance" => Ok(SensorKind::Sunlight),
            "moisture" | "soil-moisture" => Ok(SensorKind::Moisture),
            "temperature" | "temp" => Ok(SensorKind::Temperature),
            other => Err(DriverError::invalid_input(format!(
                "Unknown sensor kind '{other}'. Use sunlight, moisture or temperature"
            ))),
        }
    }
}

/// Hub output channels, one per calibrated sensor kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Temperature,
    Moisture,
    Illuminance,
}

impl ChannelKind {
    /// Channels exported for every device, in export order
    pub const ALL: [ChannelKind; 3] = [
        ChannelKind::Temperature,
        ChannelKind::Moisture,
        ChannelKind::Illuminance,
    ];

    /// Channel id used when exporting to the hub
    pub fn id(self) -> &'static str {
        match self {
            ChannelKind::Temperature => "temperature",
            ChannelKind::Moisture => "moisture",
            ChannelKind::Illuminance => "illuminance",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Uncalibrated reading decoded from the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawReading {
    pub sensor_kind: SensorKind,
    pub raw_value: u16,
}

/// Reading resolved through a calibration table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedReading {
    pub sensor_kind: SensorKind,
    pub value: f64,
    pub device_id: String,
    pub observed_at: DateTime<Utc>,
}

impl CalibratedReading {
    pub fn new(sensor_kind: SensorKind, value: f64, device_id: impl Into<String>) -> Self {
        Self {
            sensor_kind,
            value,
            device_id: device_id.into(),
            observed_at: Utc::now(),
        }
    }
}

/// Natural id type the hub uses for Flower Power devices
pub const NATURAL_ID_TYPE: &str = "FlowerPower";

/// Device description exported to the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    /// Stable identifier, the device's BLE address
    pub natural_id: String,
    pub natural_id_type: String,
    pub name: String,
    pub signatures: BTreeMap<String, String>,
}

impl DeviceDescriptor {
    /// Descriptor for a Flower Power probe at `address`
    pub fn flower_power(address: impl Into<String>) -> Self {
        let signatures = [
            ("ninja:manufacturer", "Parrot"),
            ("ninja:productName", "FlowerPower"),
            ("ninja:productType", "FlowerPower"),
            ("ninja:thingType", "plant sensor"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            natural_id: address.into(),
            natural_id_type: NATURAL_ID_TYPE.to_string(),
            name: "FlowerPower".to_string(),
            signatures,
        }
    }
}
