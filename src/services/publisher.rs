//! Channel publisher adapter
//!
//! Maps calibrated readings onto the hub's per-device channels. Publication is
//! fire-and-forget: a failing channel is logged and never affects the others.

use crate::error::Result;
use crate::models::{CalibratedReading, ChannelKind, DeviceDescriptor};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Device/channel export surface of the home-automation hub
///
/// Implementations must return quickly; anything slow belongs behind a queue
/// owned by the sink.
pub trait HubSink: Send + Sync {
    fn export_device(&self, device: &DeviceDescriptor) -> Result<()>;

    fn export_channel(&self, device: &DeviceDescriptor, channel: ChannelKind) -> Result<()>;

    fn publish(&self, device: &DeviceDescriptor, channel: ChannelKind, value: f64) -> Result<()>;
}

/// Forwards readings to a [`HubSink`]
#[derive(Clone)]
pub struct ChannelPublisher {
    sink: Arc<dyn HubSink>,
}

impl ChannelPublisher {
    pub fn new(sink: Arc<dyn HubSink>) -> Self {
        Self { sink }
    }

    /// Export the device and its three channels
    ///
    /// Returns false if the device itself could not be exported; channel
    /// export failures are logged individually.
    pub fn announce(&self, device: &DeviceDescriptor) -> bool {
        if let Err(e) = self.sink.export_device(device) {
            warn!("Failed to export device {}: {}", device.natural_id, e);
            return false;
        }

        for channel in ChannelKind::ALL {
            if let Err(e) = self.sink.export_channel(device, channel) {
                warn!(
                    "Failed to export {} channel for {}: {}",
                    channel, device.natural_id, e
                );
            }
        }

        info!("Announced Flower Power {}", device.natural_id);
        true
    }

    /// Publish one reading on its channel
    pub fn publish(&self, device: &DeviceDescriptor, reading: &CalibratedReading) {
        let channel = reading.sensor_kind.channel();
        match self.sink.publish(device, channel, reading.value) {
            Ok(()) => debug!(
                "Published {} = {} for {}",
                channel, reading.value, device.natural_id
            ),
            Err(e) => warn!(
                "Failed to publish {} for {}: {}",
                channel, device.natural_id, e
            ),
        }
    }
}

/// Sink that writes every hub call to the log
#[derive(Debug, Default)]
pub struct TracingSink;

impl HubSink for TracingSink {
    fn export_device(&self, device: &DeviceDescriptor) -> Result<()> {
        info!(
            device = %device.natural_id,
            name = %device.name,
            "export device"
        );
        Ok(())
    }

    fn export_channel(&self, device: &DeviceDescriptor, channel: ChannelKind) -> Result<()> {
        info!(device = %device.natural_id, channel = %channel, "export channel");
        Ok(())
    }

    fn publish(&self, device: &DeviceDescriptor, channel: ChannelKind, value: f64) -> Result<()> {
        info!(device = %device.natural_id, channel = %channel, value, "state");
        Ok(())
    }
}
