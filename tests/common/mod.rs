//! Common test utilities
//!
//! Mock BLE transport, recording hub sink and calibration fixtures shared by
//! the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use flowerpower_driver::calibration::{CalibrationSet, CalibrationTable};
use flowerpower_driver::client::gatt::FLOWER_POWER_SERVICE_UUID;
use flowerpower_driver::client::{Advertisement, AddressType, BleTransport, DeviceAddress, HandleRange};
use flowerpower_driver::error::{DriverError, Result};
use flowerpower_driver::models::{ChannelKind, DeviceDescriptor, SensorKind};
use flowerpower_driver::services::HubSink;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Calls recorded by [`MockTransport`]
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Connect(DeviceAddress, AddressType),
    Subscribe(DeviceAddress, HandleRange),
    Read(DeviceAddress, u16),
    VendorCommand(DeviceAddress, Vec<u8>),
}

/// Scriptable in-memory BLE transport
#[derive(Default)]
pub struct MockTransport {
    calls: Mutex<Vec<TransportCall>>,
    fail_connect: AtomicBool,
    connect_results: Mutex<VecDeque<Result<()>>>,
    reads: Mutex<HashMap<u16, Vec<u8>>>,
    fail_subscribe: Mutex<Option<HandleRange>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every connect fail until reset
    pub fn fail_connects(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Queue results for the next connect calls, ahead of `fail_connects`
    pub fn queue_connect_result(&self, result: Result<()>) {
        self.connect_results.lock().unwrap().push_back(result);
    }

    pub fn set_read(&self, handle: u16, data: Vec<u8>) {
        self.reads.lock().unwrap().insert(handle, data);
    }

    pub fn fail_subscribe_for(&self, range: HandleRange) {
        *self.fail_subscribe.lock().unwrap() = Some(range);
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn connect_count(&self, address: &DeviceAddress) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, TransportCall::Connect(a, _) if a == address))
            .count()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl BleTransport for MockTransport {
    async fn connect(&self, address: &DeviceAddress, address_type: AddressType) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(TransportCall::Connect(address.clone(), address_type));

        if let Some(result) = self.connect_results.lock().unwrap().pop_front() {
            return result;
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(DriverError::transport("adapter busy"));
        }
        Ok(())
    }

    async fn subscribe_notify(&self, address: &DeviceAddress, range: HandleRange) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(TransportCall::Subscribe(address.clone(), range));

        if *self.fail_subscribe.lock().unwrap() == Some(range) {
            return Err(DriverError::transport("write to CCC descriptor failed"));
        }
        Ok(())
    }

    async fn read_by_handle(&self, address: &DeviceAddress, handle: u16) -> Result<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .push(TransportCall::Read(address.clone(), handle));

        self.reads
            .lock()
            .unwrap()
            .get(&handle)
            .cloned()
            .ok_or_else(|| DriverError::transport(format!("read of handle {handle} timed out")))
    }

    async fn send_vendor_command(&self, address: &DeviceAddress, payload: &[u8]) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(TransportCall::VendorCommand(address.clone(), payload.to_vec()));
        Ok(())
    }
}

/// Hub sink that remembers every call
#[derive(Default)]
pub struct RecordingSink {
    pub devices: Mutex<Vec<DeviceDescriptor>>,
    pub channels: Mutex<Vec<(String, ChannelKind)>>,
    pub published: Mutex<Vec<(String, ChannelKind, f64)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn published(&self) -> Vec<(String, ChannelKind, f64)> {
        self.published.lock().unwrap().clone()
    }

    pub fn device_exports(&self) -> usize {
        self.devices.lock().unwrap().len()
    }

    pub fn channel_exports(&self) -> usize {
        self.channels.lock().unwrap().len()
    }
}

impl HubSink for RecordingSink {
    fn export_device(&self, device: &DeviceDescriptor) -> Result<()> {
        self.devices.lock().unwrap().push(device.clone());
        Ok(())
    }

    fn export_channel(&self, device: &DeviceDescriptor, channel: ChannelKind) -> Result<()> {
        self.channels
            .lock()
            .unwrap()
            .push((device.natural_id.clone(), channel));
        Ok(())
    }

    fn publish(&self, device: &DeviceDescriptor, channel: ChannelKind, value: f64) -> Result<()> {
        self.published
            .lock()
            .unwrap()
            .push((device.natural_id.clone(), channel, value));
        Ok(())
    }
}

/// Sunlight: every tenth key, value = key / 100
pub fn sunlight_table() -> CalibrationTable {
    CalibrationTable::from_entries(
        SensorKind::Sunlight,
        (0..=6553u16).map(|i| (i * 10, f64::from(i) / 10.0)),
    )
    .unwrap()
}

/// Moisture: 210 maps to 0%, 700 to 49%
pub fn moisture_table() -> CalibrationTable {
    CalibrationTable::from_entries(
        SensorKind::Moisture,
        (210..=700u16).map(|k| (k, f64::from(k - 210) / 10.0)),
    )
    .unwrap()
}

/// Temperature: linear stand-in for the probe's thermistor curve
pub fn temperature_table() -> CalibrationTable {
    CalibrationTable::from_entries(
        SensorKind::Temperature,
        (210..=1372u16).map(|k| (k, f64::from(k) * 0.05 - 10.0)),
    )
    .unwrap()
}

pub fn test_tables() -> CalibrationSet {
    CalibrationSet::new(sunlight_table(), moisture_table(), temperature_table()).unwrap()
}

/// Write the three calibration files into `dir`
pub fn write_table_files(dir: &std::path::Path) {
    let to_json = |table: CalibrationTable, keys: &mut dyn Iterator<Item = u16>| {
        let map: serde_json::Map<String, serde_json::Value> = keys
            .map(|k| (k.to_string(), serde_json::json!(table.lookup(k).unwrap())))
            .collect();
        serde_json::Value::Object(map).to_string()
    };

    std::fs::write(
        dir.join("sunlight.json"),
        to_json(sunlight_table(), &mut (0..=6553u16).map(|i| i * 10)),
    )
    .unwrap();
    std::fs::write(
        dir.join("soil-moisture.json"),
        to_json(moisture_table(), &mut (210..=700u16)),
    )
    .unwrap();
    std::fs::write(
        dir.join("temperature.json"),
        to_json(temperature_table(), &mut (210..=1372u16)),
    )
    .unwrap();
}

pub fn address(s: &str) -> DeviceAddress {
    DeviceAddress::parse(s).unwrap()
}

pub fn flower_power_advertisement(addr: &str) -> Advertisement {
    Advertisement {
        address: address(addr),
        address_type: AddressType::Public,
        local_name: Some("Flower power".to_string()),
        service_uuids: vec![FLOWER_POWER_SERVICE_UUID],
        rssi: Some(-64),
    }
}
