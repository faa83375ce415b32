//! BLE transport seam
//!
//! The BLE stack itself lives outside this crate. It is consumed through the
//! [`BleTransport`] capability trait for outgoing operations and delivers its
//! callbacks as [`TransportEvent`]s on a channel owned by the driver.

pub mod gatt;

use crate::error::{DriverError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub use gatt::HandleRange;

/// BLE device address, normalized to upper-case colon notation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceAddress(String);

impl DeviceAddress {
    /// Parse an address such as `aa:bb:cc:dd:ee:ff` or `AABBCCDDEEFF`
    pub fn parse(input: &str) -> Result<Self> {
        let hex: String = input
            .chars()
            .filter(|c| !matches!(c, ':' | '-'))
            .collect::<String>()
            .to_ascii_uppercase();

        if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DriverError::invalid_input(format!(
                "Invalid BLE address: {input}"
            )));
        }

        let octets: Vec<&str> = (0..6).map(|i| &hex[i * 2..i * 2 + 2]).collect();
        Ok(Self(octets.join(":")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceAddress {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DeviceAddress {
    type Error = DriverError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<DeviceAddress> for String {
    fn from(address: DeviceAddress) -> Self {
        address.0
    }
}

/// Whether the advertised address is public or random
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    Public,
    Random,
}

/// Advertisement seen during scanning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advertisement {
    pub address: DeviceAddress,
    pub address_type: AddressType,
    pub local_name: Option<String>,
    pub service_uuids: Vec<Uuid>,
    pub rssi: Option<i8>,
}

impl Advertisement {
    pub fn advertises(&self, service: &Uuid) -> bool {
        self.service_uuids.iter().any(|uuid| uuid == service)
    }

    /// True when the advertisement carries the Flower Power service
    pub fn is_flower_power(&self) -> bool {
        self.advertises(&gatt::FLOWER_POWER_SERVICE_UUID)
    }
}

/// Callbacks from the BLE stack
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Discovered(Advertisement),
    Connected {
        address: DeviceAddress,
    },
    ConnectFailed {
        address: DeviceAddress,
        reason: String,
    },
    Disconnected {
        address: DeviceAddress,
    },
    Notification {
        address: DeviceAddress,
        handle: u16,
        data: Vec<u8>,
    },
}

impl TransportEvent {
    /// Address of the device the event concerns
    pub fn address(&self) -> &DeviceAddress {
        match self {
            TransportEvent::Discovered(adv) => &adv.address,
            TransportEvent::Connected { address }
            | TransportEvent::ConnectFailed { address, .. }
            | TransportEvent::Disconnected { address }
            | TransportEvent::Notification { address, .. } => address,
        }
    }
}

/// Outgoing operations offered by the BLE stack
///
/// `connect` only initiates the connection. Its outcome arrives later as a
/// [`TransportEvent::Connected`] or [`TransportEvent::ConnectFailed`].
#[async_trait]
pub trait BleTransport: Send + Sync {
    /// Start connecting to a device
    async fn connect(&self, address: &DeviceAddress, address_type: AddressType) -> Result<()>;

    /// Enable notifications for every characteristic inside `range`
    async fn subscribe_notify(&self, address: &DeviceAddress, range: HandleRange) -> Result<()>;

    /// Read an attribute value, waiting for the response
    async fn read_by_handle(&self, address: &DeviceAddress, handle: u16) -> Result<Vec<u8>>;

    /// Send an opaque vendor command, e.g. enabling live mode
    async fn send_vendor_command(&self, address: &DeviceAddress, payload: &[u8]) -> Result<()>;
}
