//! Active-device registry
//!
//! Tracks which addresses currently hold a connection (or a connection
//! attempt) and which have been announced to the hub. Callbacks for different
//! devices arrive concurrently, so every check-and-set happens under one lock.

use crate::client::DeviceAddress;
use crate::error::{DriverError, Result};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct RegistryState {
    active: HashSet<DeviceAddress>,
    announced: HashSet<DeviceAddress>,
}

/// Thread-safe set of active and announced device addresses
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    state: Mutex<RegistryState>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `address` active; false if it already was
    pub fn try_activate(&self, address: &DeviceAddress) -> bool {
        self.lock().active.insert(address.clone())
    }

    /// Like [`try_activate`](Self::try_activate), failing with `DuplicateDevice`
    pub fn activate(&self, address: &DeviceAddress) -> Result<()> {
        if self.try_activate(address) {
            Ok(())
        } else {
            Err(DriverError::duplicate_device(address.as_str()))
        }
    }

    /// Mark `address` inactive; returns whether it was active
    pub fn deactivate(&self, address: &DeviceAddress) -> bool {
        self.lock().active.remove(address)
    }

    pub fn is_active(&self, address: &DeviceAddress) -> bool {
        self.lock().active.contains(address)
    }

    /// Claim the one-time hub announcement for `address`
    pub fn try_announce(&self, address: &DeviceAddress) -> bool {
        self.lock().announced.insert(address.clone())
    }

    /// Release an announcement claim after a failed export
    pub fn forget_announcement(&self, address: &DeviceAddress) {
        self.lock().announced.remove(address);
    }

    pub fn is_announced(&self, address: &DeviceAddress) -> bool {
        self.lock().announced.contains(address)
    }

    pub fn active_count(&self) -> usize {
        self.lock().active.len()
    }
}
