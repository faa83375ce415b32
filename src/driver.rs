//! Flower Power hub driver
//!
//! Owns the device registry, one session per probe, the shared decoder and
//! the reconnect supervisor. Transport callbacks arrive as
//! [`TransportEvent`]s and are dispatched to the session for their address.

use crate::calibration::CalibrationSet;
use crate::client::{Advertisement, BleTransport, DeviceAddress, TransportEvent};
use crate::config::DriverConfig;
use crate::device::{
    ConnectOutcome, ConnectionState, DeviceRegistry, DeviceSession, SessionContext,
};
use crate::error::{DriverError, Result};
use crate::error_recovery::{ReconnectStats, ReconnectSupervisor};
use crate::services::{ChannelPublisher, HubSink, SensorDecoder};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, trace, warn};

/// What happened to an advertisement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// Not a Flower Power
    Ignored,
    /// Device already connected or connecting
    AlreadyActive,
    /// Connect request issued
    Connecting,
    /// Connect request rejected by the transport
    ConnectFailed,
}

/// Bridges Flower Power probes into the hub
pub struct FlowerPowerDriver {
    ctx: SessionContext,
    supervisor: Arc<ReconnectSupervisor>,
    sessions: RwLock<HashMap<DeviceAddress, Arc<DeviceSession>>>,
}

impl FlowerPowerDriver {
    /// Build a driver around already-loaded calibration tables
    pub fn new(
        config: &DriverConfig,
        tables: CalibrationSet,
        transport: Arc<dyn BleTransport>,
        sink: Arc<dyn HubSink>,
    ) -> Self {
        let ctx = SessionContext {
            transport,
            registry: Arc::new(DeviceRegistry::new()),
            decoder: Arc::new(SensorDecoder::new(tables, config.gatt.payload_offset)),
            publisher: ChannelPublisher::new(sink),
            gatt: Arc::new(config.gatt.clone()),
        };

        Self {
            ctx,
            supervisor: Arc::new(ReconnectSupervisor::new(config.reconnect.clone())),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Load calibration and build the driver
    ///
    /// Fails with `DataUnavailable` before any device is touched if a
    /// calibration table cannot be loaded.
    pub fn start(
        config: &DriverConfig,
        transport: Arc<dyn BleTransport>,
        sink: Arc<dyn HubSink>,
    ) -> Result<Self> {
        info!("Flower Power driver starting");
        config.validate()?;
        let tables = CalibrationSet::load(&config.calibration)?;
        Ok(Self::new(config, tables, transport, sink))
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.ctx.registry
    }

    pub fn decoder(&self) -> &Arc<SensorDecoder> {
        &self.ctx.decoder
    }

    pub fn reconnect_stats(&self) -> ReconnectStats {
        self.supervisor.stats()
    }

    pub async fn session(&self, address: &DeviceAddress) -> Option<Arc<DeviceSession>> {
        self.sessions.read().await.get(address).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn session_for(&self, adv: &Advertisement) -> Arc<DeviceSession> {
        if let Some(session) = self.session(&adv.address).await {
            return session;
        }

        self.sessions
            .write()
            .await
            .entry(adv.address.clone())
            .or_insert_with(|| {
                debug!("Making Flower Power session for {}", adv.address);
                Arc::new(DeviceSession::new(
                    adv.address.clone(),
                    adv.address_type,
                    self.ctx.clone(),
                ))
            })
            .clone()
    }

    /// Handle an advertisement: announce new probes and connect inactive ones
    pub async fn on_discovered(&self, adv: Advertisement) -> DiscoveryOutcome {
        if !adv.is_flower_power() {
            trace!("Ignoring advertisement from {}", adv.address);
            return DiscoveryOutcome::Ignored;
        }

        if self.ctx.registry.is_active(&adv.address) {
            return DiscoveryOutcome::AlreadyActive;
        }

        let session = self.session_for(&adv).await;

        if self.ctx.registry.try_announce(&adv.address) {
            info!("Found new Flower Power {}", adv.address);
            if !self.ctx.publisher.announce(session.descriptor()) {
                self.ctx.registry.forget_announcement(&adv.address);
            }
        }

        match session.connect().await {
            Ok(ConnectOutcome::Initiated) => DiscoveryOutcome::Connecting,
            Ok(ConnectOutcome::AlreadyActive) => DiscoveryOutcome::AlreadyActive,
            Err(_) => DiscoveryOutcome::ConnectFailed,
        }
    }

    /// Dispatch one transport event
    pub async fn handle_event(&self, event: TransportEvent) {
        trace!(address = %event.address(), "transport event");
        match event {
            TransportEvent::Discovered(adv) => {
                self.on_discovered(adv).await;
            }
            TransportEvent::Connected { address } => {
                let Some(session) = self.known_session(&address, "connect").await else {
                    return;
                };
                session.on_connected().await;
                self.supervisor.on_connected(&address);
            }
            TransportEvent::ConnectFailed { address, reason } => {
                let Some(session) = self.known_session(&address, "connect failure").await else {
                    return;
                };
                session.on_connect_failed(&reason).await;
                self.supervisor
                    .on_connect_failed(session, &DriverError::transport(reason));
            }
            TransportEvent::Disconnected { address } => {
                let Some(session) = self.known_session(&address, "disconnect").await else {
                    return;
                };
                match session.on_disconnected().await {
                    ConnectionState::Connected => self.supervisor.on_disconnected(session).await,
                    ConnectionState::Connecting if self.supervisor.is_supervising(&address) => {
                        self.supervisor.on_connect_failed(
                            session,
                            &DriverError::transport("link dropped while connecting"),
                        );
                    }
                    ConnectionState::Connecting | ConnectionState::Disconnected => {
                        debug!("Disconnect from {} outside a connection, not reconnecting", address);
                    }
                }
            }
            TransportEvent::Notification {
                address,
                handle,
                data,
            } => {
                let Some(session) = self.known_session(&address, "notification").await else {
                    return;
                };
                session.on_notification(handle, &data).await;
            }
        }
    }

    async fn known_session(&self, address: &DeviceAddress, what: &str) -> Option<Arc<DeviceSession>> {
        let session = self.session(address).await;
        if session.is_none() {
            warn!("Ignoring {} for unknown device {}", what, address);
        }
        session
    }

    /// Consume transport events until the sender side closes
    pub async fn run(&self, mut events: mpsc::Receiver<TransportEvent>) {
        info!("Flower Power driver listening for transport events");
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        info!("Transport event stream closed");
    }

    /// Log shutdown; returns the number of known devices
    pub async fn stop(&self) -> usize {
        let count = self.session_count().await;
        info!(
            "Flower Power driver stopping ({} device(s), {} active)",
            count,
            self.ctx.registry.active_count()
        );
        count
    }
}
