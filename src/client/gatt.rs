//! GATT layout of the Flower Power probe

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::{uuid, Uuid};

/// Primary service advertised by every Flower Power
pub const FLOWER_POWER_SERVICE_UUID: Uuid = uuid!("39e1fa00-84a8-11e2-afba-0002a5d5c51b");

pub const SUNLIGHT_UUID: Uuid = uuid!("39e1fa01-84a8-11e2-afba-0002a5d5c51b");
pub const TEMPERATURE_UUID: Uuid = uuid!("39e1fa04-84a8-11e2-afba-0002a5d5c51b");
pub const SOIL_MOISTURE_UUID: Uuid = uuid!("39e1fa05-84a8-11e2-afba-0002a5d5c51b");
pub const LIVE_MODE_UUID: Uuid = uuid!("39e1fa06-84a8-11e2-afba-0002a5d5c51b");
pub const FRIENDLY_NAME_UUID: Uuid = uuid!("39e1fe03-84a8-11e2-afba-0002a5d5c51b");
pub const COLOR_UUID: Uuid = uuid!("39e1fe04-84a8-11e2-afba-0002a5d5c51b");

/// Default value handles
pub const SUNLIGHT_HANDLE: u16 = 37;
pub const TEMPERATURE_HANDLE: u16 = 49;
pub const MOISTURE_HANDLE: u16 = 53;
pub const BATTERY_HANDLE: u16 = 68;

/// Payload written to switch the probe into live streaming mode
pub const LIVE_MODE_PAYLOAD: [u8; 1] = [0x01];

/// Inclusive range of attribute handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleRange {
    pub start: u16,
    pub end: u16,
}

impl HandleRange {
    pub const fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    /// Range of one characteristic: declaration, value and CCC descriptor
    pub const fn around(value_handle: u16) -> Self {
        Self {
            start: value_handle.saturating_sub(1),
            end: value_handle.saturating_add(1),
        }
    }

    pub fn contains(&self, handle: u16) -> bool {
        self.start <= handle && handle <= self.end
    }

    pub fn overlaps(&self, other: &HandleRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

impl fmt::Display for HandleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}
