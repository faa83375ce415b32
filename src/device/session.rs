//! Per-device session
//!
//! Owns the connection state machine of one probe and demultiplexes its
//! notifications by handle range:
//!
//! ```text
//! Disconnected --connect()--> Connecting --connected--> Connected
//!      ^                          |                         |
//!      +------ connect failed ----+------- disconnected ----+
//! ```

use crate::client::{AddressType, BleTransport, DeviceAddress, HandleRange};
use crate::config::GattConfig;
use crate::device::registry::DeviceRegistry;
use crate::error::{DriverError, Result};
use crate::models::{CalibratedReading, DeviceDescriptor, SensorKind};
use crate::services::{ChannelPublisher, SensorDecoder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Connection state of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Result of asking a session to connect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Transport accepted the connect request
    Initiated,
    /// Address already active, nothing done
    AlreadyActive,
}

/// Collaborators shared by every session of a driver
#[derive(Clone)]
pub struct SessionContext {
    pub transport: Arc<dyn BleTransport>,
    pub registry: Arc<DeviceRegistry>,
    pub decoder: Arc<SensorDecoder>,
    pub publisher: ChannelPublisher,
    pub gatt: Arc<GattConfig>,
}

/// One physical Flower Power
pub struct DeviceSession {
    address: DeviceAddress,
    address_type: AddressType,
    descriptor: DeviceDescriptor,
    state: RwLock<ConnectionState>,
    subscriptions: RwLock<BTreeSet<HandleRange>>,
    ctx: SessionContext,
}

impl DeviceSession {
    pub fn new(address: DeviceAddress, address_type: AddressType, ctx: SessionContext) -> Self {
        let descriptor = DeviceDescriptor::flower_power(address.as_str());
        Self {
            address,
            address_type,
            descriptor,
            state: RwLock::new(ConnectionState::Disconnected),
            subscriptions: RwLock::new(BTreeSet::new()),
            ctx,
        }
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    pub fn address_type(&self) -> AddressType {
        self.address_type
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn subscribed_ranges(&self) -> Vec<HandleRange> {
        self.subscriptions.read().await.iter().copied().collect()
    }

    /// Start a connection unless one is already live for this address
    pub async fn connect(&self) -> Result<ConnectOutcome> {
        if let Err(e) = self.ctx.registry.activate(&self.address) {
            debug!("{}, skipping connect", e);
            return Ok(ConnectOutcome::AlreadyActive);
        }

        *self.state.write().await = ConnectionState::Connecting;
        debug!("Connecting to Flower Power {}", self.address);

        match self
            .ctx
            .transport
            .connect(&self.address, self.address_type)
            .await
        {
            Ok(()) => Ok(ConnectOutcome::Initiated),
            Err(e) => {
                *self.state.write().await = ConnectionState::Disconnected;
                self.ctx.registry.deactivate(&self.address);
                warn!("Connect error for {}: {}", self.address, e);
                Err(e)
            }
        }
    }

    /// Transport reported the connection is up: subscribe, then enable live mode
    pub async fn on_connected(&self) {
        self.ctx.registry.try_activate(&self.address);
        *self.state.write().await = ConnectionState::Connected;
        info!("Connected to Flower Power {}", self.address);

        debug!("Setting up notifications for {}", self.address);
        for kind in SensorKind::ALL {
            let range = self.ctx.gatt.range_for(kind);
            match self.ctx.transport.subscribe_notify(&self.address, range).await {
                Ok(()) => {
                    self.subscriptions.write().await.insert(range);
                }
                Err(e) => warn!(
                    "Failed to subscribe to {} notifications ({}) on {}: {}",
                    kind, range, self.address, e
                ),
            }
        }

        debug!("Enabling live mode on {}", self.address);
        if let Err(e) = self
            .ctx
            .transport
            .send_vendor_command(&self.address, &self.ctx.gatt.live_mode_payload)
            .await
        {
            warn!("Failed to enable live mode on {}: {}", self.address, e);
        }
    }

    /// Transport reported the connection attempt failed
    pub async fn on_connect_failed(&self, reason: &str) {
        *self.state.write().await = ConnectionState::Disconnected;
        self.ctx.registry.deactivate(&self.address);
        warn!("Connection to Flower Power {} failed: {}", self.address, reason);
    }

    /// Transport reported a disconnect; returns the state it interrupted
    ///
    /// A disconnect while `Connecting` is a failed attempt, not a lost link.
    pub async fn on_disconnected(&self) -> ConnectionState {
        self.ctx.registry.deactivate(&self.address);
        let previous = std::mem::replace(
            &mut *self.state.write().await,
            ConnectionState::Disconnected,
        );
        self.subscriptions.write().await.clear();

        match previous {
            ConnectionState::Connected => info!("Disconnected from Flower Power {}", self.address),
            ConnectionState::Connecting => warn!(
                "Flower Power {} dropped before the connection came up",
                self.address
            ),
            ConnectionState::Disconnected => {
                debug!("Stale disconnect from Flower Power {}", self.address)
            }
        }
        previous
    }

    /// Route a notification to the decoder and publish the result
    ///
    /// Returns the published reading, or `None` when the notification was
    /// discarded.
    pub async fn on_notification(&self, handle: u16, data: &[u8]) -> Option<CalibratedReading> {
        let state = self.state().await;
        if state != ConnectionState::Connected {
            debug!(
                "Discarding notification on handle {} from {} while {:?}",
                handle, self.address, state
            );
            return None;
        }

        let Some(kind) = self.ctx.gatt.kind_for_handle(handle) else {
            warn!(
                "Unknown notification handle {} from {} (payload {})",
                handle,
                self.address,
                hex::encode(data)
            );
            return None;
        };

        match self.ctx.decoder.decode(kind, data, self.address.as_str()) {
            Ok(reading) => {
                info!("Got {} from {}: {}", kind, self.address, reading.value);
                self.ctx.publisher.publish(&self.descriptor, &reading);
                Some(reading)
            }
            Err(DriverError::KeyNotFound { key, .. }) => {
                warn!(
                    "No {} calibration entry for raw value {} from {}",
                    kind, key, self.address
                );
                None
            }
            Err(e) => {
                warn!(
                    "Dropping {} notification from {} (payload {}): {}",
                    kind,
                    self.address,
                    hex::encode(data),
                    e
                );
                None
            }
        }
    }

    async fn read_handle(&self, handle: u16) -> Result<Vec<u8>> {
        self.ctx
            .transport
            .read_by_handle(&self.address, handle)
            .await
            .map_err(|e| {
                warn!("Read of handle {} on {} failed: {}", handle, self.address, e);
                e
            })
    }

    /// Read and calibrate one sensor on demand
    pub async fn read_now(&self, kind: SensorKind) -> Result<f64> {
        let data = self.read_handle(self.ctx.gatt.value_handle(kind)).await?;
        let reading = self
            .ctx
            .decoder
            .decode(kind, &data, self.address.as_str())
            .map_err(|e| {
                warn!("Polled {} read on {} unusable: {}", kind, self.address, e);
                e
            })?;
        Ok(reading.value)
    }

    pub async fn read_sunlight_now(&self) -> Result<f64> {
        self.read_now(SensorKind::Sunlight).await
    }

    pub async fn read_moisture_now(&self) -> Result<f64> {
        self.read_now(SensorKind::Moisture).await
    }

    pub async fn read_temperature_now(&self) -> Result<f64> {
        self.read_now(SensorKind::Temperature).await
    }

    /// Battery level as reported by the probe, uncalibrated
    pub async fn read_battery_level(&self) -> Result<u16> {
        let data = self.read_handle(self.ctx.gatt.battery_handle).await?;
        self.ctx.decoder.decode_battery(&data)
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("address", &self.address)
            .field("address_type", &self.address_type)
            .finish_non_exhaustive()
    }
}
