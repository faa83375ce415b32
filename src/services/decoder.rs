//! Sensor value decoding
//!
//! One decoder serves both the notification path and the polled accessors:
//! strip the configured prefix, read a little-endian `u16`, clamp it into
//! the kind's calibrated domain, quantize, then look it up.

use crate::calibration::CalibrationSet;
use crate::error::{DriverError, Result};
use crate::models::{CalibratedReading, RawReading, SensorKind};

/// Clamp and quantization rules for one sensor kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorPolicy {
    pub floor: u16,
    pub ceiling: u16,
    /// Keys are rounded down to a multiple of this
    pub quantum: u16,
}

impl SensorPolicy {
    pub const fn for_kind(kind: SensorKind) -> Self {
        match kind {
            // Sunlight tables only cover every tenth reading
            SensorKind::Sunlight => Self {
                floor: 0,
                ceiling: 65530,
                quantum: 10,
            },
            SensorKind::Moisture => Self {
                floor: 210,
                ceiling: 700,
                quantum: 1,
            },
            SensorKind::Temperature => Self {
                floor: 210,
                ceiling: 1372,
                quantum: 1,
            },
        }
    }

    /// Saturate into `[floor, ceiling]`
    pub fn clamp(&self, raw: u16) -> u16 {
        raw.clamp(self.floor, self.ceiling)
    }

    pub fn quantize(&self, value: u16) -> u16 {
        value - value % self.quantum
    }

    /// Table key for a raw reading
    pub fn key(&self, raw: u16) -> u16 {
        self.quantize(self.clamp(raw))
    }
}

/// Turns notification payloads into calibrated readings
#[derive(Debug, Clone)]
pub struct SensorDecoder {
    tables: CalibrationSet,
    payload_offset: usize,
}

impl SensorDecoder {
    pub fn new(tables: CalibrationSet, payload_offset: usize) -> Self {
        Self {
            tables,
            payload_offset,
        }
    }

    pub fn payload_offset(&self) -> usize {
        self.payload_offset
    }

    fn value_bytes<'a>(&self, payload: &'a [u8]) -> Result<&'a [u8]> {
        payload.get(self.payload_offset..).ok_or_else(|| {
            DriverError::decode(format!(
                "payload of {} bytes is shorter than the {}-byte prefix",
                payload.len(),
                self.payload_offset
            ))
        })
    }

    /// Little-endian `u16` after the configured prefix; trailing bytes ignored
    pub fn read_u16(&self, payload: &[u8]) -> Result<u16> {
        match self.value_bytes(payload)? {
            [lo, hi, ..] => Ok(u16::from_le_bytes([*lo, *hi])),
            _ => Err(DriverError::decode(format!(
                "cannot read u16 from {:02X?}",
                payload
            ))),
        }
    }

    pub fn decode_raw(&self, kind: SensorKind, payload: &[u8]) -> Result<RawReading> {
        Ok(RawReading {
            sensor_kind: kind,
            raw_value: self.read_u16(payload)?,
        })
    }

    /// Clamp, quantize and look up a raw reading
    pub fn calibrate(&self, raw: RawReading) -> Result<f64> {
        let key = SensorPolicy::for_kind(raw.sensor_kind).key(raw.raw_value);
        self.tables.table(raw.sensor_kind).lookup(key)
    }

    /// Full pipeline from payload to calibrated reading
    pub fn decode(
        &self,
        kind: SensorKind,
        payload: &[u8],
        device_id: &str,
    ) -> Result<CalibratedReading> {
        let raw = self.decode_raw(kind, payload)?;
        let value = self.calibrate(raw)?;
        Ok(CalibratedReading::new(kind, value, device_id))
    }

    /// Battery level has no calibration: a single byte, or a little-endian `u16`
    pub fn decode_battery(&self, payload: &[u8]) -> Result<u16> {
        match self.value_bytes(payload)? {
            [] => Err(DriverError::decode("empty battery payload")),
            [level] => Ok(u16::from(*level)),
            [lo, hi, ..] => Ok(u16::from_le_bytes([*lo, *hi])),
        }
    }
}
