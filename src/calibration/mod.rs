//! Calibration lookup tables
//!
//! Each sensor kind maps raw ADC readings to physical values through a sparse,
//! integer-keyed table. Tables are loaded once at startup and shared
//! read-only between all device sessions.

use crate::config::CalibrationConfig;
use crate::error::{DriverError, Result};
use crate::models::SensorKind;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Immutable raw-reading to calibrated-value mapping for one sensor kind
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTable {
    kind: SensorKind,
    entries: BTreeMap<u16, f64>,
}

impl CalibrationTable {
    /// Build a table from in-memory entries
    pub fn from_entries<I>(kind: SensorKind, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u16, f64)>,
    {
        let entries: BTreeMap<u16, f64> = entries.into_iter().collect();
        if entries.is_empty() {
            return Err(DriverError::data_unavailable(kind, "table has no entries"));
        }
        Ok(Self { kind, entries })
    }

    /// Parse a JSON object of the form `{"210": 0.0, "211": 0.08, ...}`
    pub fn from_json_str(kind: SensorKind, json: &str) -> Result<Self> {
        let raw: HashMap<String, f64> = serde_json::from_str(json)
            .map_err(|e| DriverError::data_unavailable(kind, format!("invalid JSON: {e}")))?;

        let mut entries = BTreeMap::new();
        for (key, value) in raw {
            let key: u16 = key.trim().parse().map_err(|_| {
                DriverError::data_unavailable(kind, format!("key '{key}' is not a 16-bit reading"))
            })?;
            entries.insert(key, value);
        }

        Self::from_entries(kind, entries)
    }

    /// Load the table for `kind` from a JSON file
    pub fn load<P: AsRef<Path>>(kind: SensorKind, path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DriverError::data_unavailable(kind, format!("cannot read {}: {}", path.display(), e))
        })?;

        let table = Self::from_json_str(kind, &content)?;
        debug!(
            "Loaded {} calibration from {} ({} entries)",
            kind,
            path.display(),
            table.len()
        );
        Ok(table)
    }

    /// Calibrated value for an exact key
    pub fn lookup(&self, key: u16) -> Result<f64> {
        self.entries
            .get(&key)
            .copied()
            .ok_or_else(|| DriverError::key_not_found(self.kind, key))
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Smallest and largest key present
    pub fn key_range(&self) -> Option<(u16, u16)> {
        let first = self.entries.keys().next()?;
        let last = self.entries.keys().next_back()?;
        Some((*first, *last))
    }
}

/// The three tables a driver needs, shared via `Arc`
#[derive(Debug, Clone)]
pub struct CalibrationSet {
    sunlight: Arc<CalibrationTable>,
    moisture: Arc<CalibrationTable>,
    temperature: Arc<CalibrationTable>,
}

impl CalibrationSet {
    /// Group already-loaded tables, checking each sits in the right slot
    pub fn new(
        sunlight: CalibrationTable,
        moisture: CalibrationTable,
        temperature: CalibrationTable,
    ) -> Result<Self> {
        for (expected, table) in [
            (SensorKind::Sunlight, &sunlight),
            (SensorKind::Moisture, &moisture),
            (SensorKind::Temperature, &temperature),
        ] {
            if table.kind() != expected {
                return Err(DriverError::config(format!(
                    "{} table supplied where {} was expected",
                    table.kind(),
                    expected
                )));
            }
        }

        Ok(Self {
            sunlight: Arc::new(sunlight),
            moisture: Arc::new(moisture),
            temperature: Arc::new(temperature),
        })
    }

    /// Load all tables, failing on the first unavailable one
    pub fn load(config: &CalibrationConfig) -> Result<Self> {
        let sunlight =
            CalibrationTable::load(SensorKind::Sunlight, config.path_for(SensorKind::Sunlight))?;
        let moisture =
            CalibrationTable::load(SensorKind::Moisture, config.path_for(SensorKind::Moisture))?;
        let temperature = CalibrationTable::load(
            SensorKind::Temperature,
            config.path_for(SensorKind::Temperature),
        )?;

        info!(
            "Calibration tables loaded from {} (sunlight: {}, moisture: {}, temperature: {})",
            config.data_dir.display(),
            sunlight.len(),
            moisture.len(),
            temperature.len()
        );

        Self::new(sunlight, moisture, temperature)
    }

    pub fn table(&self, kind: SensorKind) -> &Arc<CalibrationTable> {
        match kind {
            SensorKind::Sunlight => &self.sunlight,
            SensorKind::Moisture => &self.moisture,
            SensorKind::Temperature => &self.temperature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_lookup_exact_key() {
        let table = CalibrationTable::from_json_str(
            SensorKind::Moisture,
            r#"{"210": 0.0, "211": 0.12, "700": 54.3}"#,
        )
        .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.lookup(211).unwrap(), 0.12);
        assert_eq!(table.key_range(), Some((210, 700)));
    }

    #[test]
    fn test_missing_key_is_error_not_panic() {
        let table = CalibrationTable::from_entries(SensorKind::Sunlight, [(0, 0.0), (10, 0.1)])
            .unwrap();
        match table.lookup(5) {
            Err(DriverError::KeyNotFound { kind, key }) => {
                assert_eq!(kind, SensorKind::Sunlight);
                assert_eq!(key, 5);
            }
            other => panic!("expected KeyNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_lookup_is_idempotent() {
        let table =
            CalibrationTable::from_entries(SensorKind::Temperature, [(300, 4.25)]).unwrap();
        let first = table.lookup(300).unwrap();
        let second = table.lookup(300).unwrap();
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn test_non_numeric_key_rejected() {
        let result = CalibrationTable::from_json_str(SensorKind::Moisture, r#"{"abc": 1.0}"#);
        assert!(matches!(result, Err(DriverError::DataUnavailable { .. })));
    }

    #[test]
    fn test_out_of_range_key_rejected() {
        let result = CalibrationTable::from_json_str(SensorKind::Sunlight, r#"{"70000": 1.0}"#);
        assert!(matches!(result, Err(DriverError::DataUnavailable { .. })));
    }

    #[test]
    fn test_empty_table_rejected() {
        let result = CalibrationTable::from_json_str(SensorKind::Moisture, "{}");
        assert!(matches!(result, Err(DriverError::DataUnavailable { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = CalibrationTable::load(SensorKind::Temperature, dir.path().join("nope.json"));
        match result {
            Err(err @ DriverError::DataUnavailable { .. }) => assert!(err.is_fatal()),
            other => panic!("expected DataUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_set_rejects_swapped_tables() {
        let sunlight = CalibrationTable::from_entries(SensorKind::Sunlight, [(0, 0.0)]).unwrap();
        let moisture = CalibrationTable::from_entries(SensorKind::Moisture, [(210, 0.0)]).unwrap();
        let temperature =
            CalibrationTable::from_entries(SensorKind::Temperature, [(210, -10.0)]).unwrap();

        assert!(CalibrationSet::new(moisture.clone(), sunlight.clone(), temperature.clone()).is_err());
        let set = CalibrationSet::new(sunlight, moisture, temperature).unwrap();
        assert_eq!(set.table(SensorKind::Temperature).lookup(210).unwrap(), -10.0);
    }

    #[test]
    fn test_set_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sunlight.json"), r#"{"0": 0.0, "10": 0.02}"#).unwrap();
        fs::write(dir.path().join("soil-moisture.json"), r#"{"210": 0.0}"#).unwrap();
        fs::write(dir.path().join("temperature.json"), r#"{"210": -10.0}"#).unwrap();

        let config = CalibrationConfig {
            data_dir: dir.path().to_path_buf(),
            ..CalibrationConfig::default()
        };
        let set = CalibrationSet::load(&config).unwrap();
        assert_eq!(set.table(SensorKind::Sunlight).len(), 2);
    }
}
