//! Parrot Flower Power driver for home-automation hubs
//!
//! Bridges Flower Power plant probes into a hub's device/channel model. The
//! BLE stack and the hub are external collaborators reached through the
//! [`client::BleTransport`] and [`services::HubSink`] traits.
//!
//! # Features
//!
//! - Lookup-table calibration of sunlight, soil moisture and temperature
//! - Handle-range demultiplexing of GATT notifications
//! - Connection lifecycle with an active-device registry
//! - Bounded, backed-off reconnects after unexpected disconnects

pub mod calibration;
pub mod client;
pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod error_recovery;
pub mod models;
pub mod services;

// Re-export main types for convenience
pub use calibration::{CalibrationSet, CalibrationTable};
pub use client::{Advertisement, BleTransport, DeviceAddress, TransportEvent};
pub use config::DriverConfig;
pub use driver::{DiscoveryOutcome, FlowerPowerDriver};
pub use error::{DriverError, Result};
pub use models::{CalibratedReading, ChannelKind, SensorKind};
pub use services::{HubSink, SensorDecoder};
