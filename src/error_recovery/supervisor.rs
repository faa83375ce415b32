//! Reconnection supervisor
//!
//! Reacts to the disconnect of an active device with one immediate reconnect.
//! Only when that attempt fails does it schedule more, spaced by the
//! [`ReconnectPolicy`] and bounded by its attempt budget. Delayed attempts run
//! on spawned tasks so the event loop never sleeps.

use crate::client::DeviceAddress;
use crate::device::{ConnectOutcome, DeviceSession};
use crate::error::DriverError;
use crate::error_recovery::ReconnectPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Reconnect statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconnectStats {
    /// Disconnects that started a reconnect cycle
    pub cycles_started: u64,
    /// Connect calls issued, immediate and delayed
    pub attempts: u64,
    /// Cycles that ended with the device connected again
    pub recovered: u64,
    /// Cycles abandoned after the attempt budget ran out
    pub given_up: u64,
    pub last_attempt: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct SupervisorState {
    /// Failed attempts per address in the current cycle
    failures: HashMap<DeviceAddress, u32>,
    stats: ReconnectStats,
}

/// Drives reconnects for disconnected devices
#[derive(Debug)]
pub struct ReconnectSupervisor {
    policy: ReconnectPolicy,
    state: Mutex<SupervisorState>,
}

impl ReconnectSupervisor {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(SupervisorState::default()),
        }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    fn lock(&self) -> MutexGuard<'_, SupervisorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_attempt(&self) {
        let mut state = self.lock();
        state.stats.attempts += 1;
        state.stats.last_attempt = Some(Utc::now());
    }

    /// Whether `address` is inside a reconnect cycle
    pub fn is_supervising(&self, address: &DeviceAddress) -> bool {
        self.lock().failures.contains_key(address)
    }

    pub fn stats(&self) -> ReconnectStats {
        self.lock().stats.clone()
    }

    /// Start a reconnect cycle; the session must already be marked inactive
    pub async fn on_disconnected(self: &Arc<Self>, session: Arc<DeviceSession>) {
        {
            let mut state = self.lock();
            state.failures.insert(session.address().clone(), 0);
            state.stats.cycles_started += 1;
        }

        info!("Reconnecting to Flower Power {}", session.address());
        self.record_attempt();

        match session.connect().await {
            Ok(ConnectOutcome::Initiated) => {}
            Ok(ConnectOutcome::AlreadyActive) => {
                debug!("{} reconnected elsewhere, ending cycle", session.address());
                self.lock().failures.remove(session.address());
            }
            Err(e) => self.on_connect_failed(session, &e),
        }
    }

    /// The device is connected again; close its cycle
    pub fn on_connected(&self, address: &DeviceAddress) {
        let mut state = self.lock();
        if let Some(failures) = state.failures.remove(address) {
            state.stats.recovered += 1;
            info!(
                "Flower Power {} recovered after {} failed attempt(s)",
                address, failures
            );
        }
    }

    /// A supervised attempt failed; schedule the next one or give up
    ///
    /// Failures for addresses outside a reconnect cycle are ignored: the next
    /// advertisement will trigger a fresh connect. Errors that retrying cannot
    /// fix end the cycle at once.
    pub fn on_connect_failed(self: &Arc<Self>, session: Arc<DeviceSession>, error: &DriverError) {
        let address = session.address().clone();

        let failures = {
            let mut state = self.lock();
            let Some(failures) = state.failures.get_mut(&address) else {
                return;
            };
            *failures += 1;
            let failures = *failures;

            if !error.is_retryable() || !self.policy.allows_attempt(failures) {
                state.failures.remove(&address);
                state.stats.given_up += 1;
                error!(
                    "Giving up on Flower Power {} after {} attempts: {} ({})",
                    address,
                    failures,
                    error,
                    error.category()
                );
                return;
            }
            failures
        };

        let next_attempt = failures + 1;
        let delay = self.policy.calculate_delay(next_attempt);
        warn!(
            "Reconnect to {} failed ({}), attempt {}/{} in {:?}",
            address, error, next_attempt, self.policy.max_attempts, delay
        );

        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            sleep(delay).await;

            if !supervisor.is_supervising(session.address()) {
                return;
            }

            supervisor.record_attempt();
            match session.connect().await {
                Ok(ConnectOutcome::Initiated) => {}
                Ok(ConnectOutcome::AlreadyActive) => {
                    supervisor.lock().failures.remove(session.address());
                }
                Err(e) => supervisor.on_connect_failed(session, &e),
            }
        });
    }
}
