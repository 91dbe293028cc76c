//! Core data types for the environmental sensor simulation.
//!
//! This module defines the shared domain model imported by all other modules.
//! It contains no logic beyond (de)serialization helpers and formatting.

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Sensor types
// ---------------------------------------------------------------------------

/// Air temperature, °C. Never jittered, never classified.
pub const TEMPERATURE: &str = "Temperatur";

/// Nitrogen dioxide, µg/m³.
pub const NO2: &str = "NO2";

/// Particulate matter ≤ 10 µm, µg/m³.
pub const PM10: &str = "PM10";

/// Particulate matter ≤ 2.5 µm, µg/m³.
pub const PM2_5: &str = "PM2.5";

/// Ozone, µg/m³.
pub const O3: &str = "O3";

/// Carbon monoxide, mg/m³.
pub const CO: &str = "CO";

/// Sulphur dioxide, µg/m³.
pub const SO2: &str = "SO2";

// ---------------------------------------------------------------------------
// Configuration records
// ---------------------------------------------------------------------------

/// One sensor entry of the JSON configuration file.
///
/// ```json
/// { "type": "PM10", "active": true, "threshold": [10, "20", 25, 50, 75, 100] }
/// ```
///
/// `thresholds` partitions the value domain into `thresholds.len() + 1`
/// levels. Only `active` is mutated after loading (the user toggles it).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SensorConfig {
    #[serde(rename = "type")]
    pub sensor_type: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(rename = "threshold", default, deserialize_with = "deserialize_thresholds")]
    pub thresholds: Vec<f64>,
}

fn default_active() -> bool {
    true
}

/// Config files written by hand mix numbers and numeric strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum ThresholdValue {
    Number(f64),
    Text(String),
}

fn deserialize_thresholds<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<ThresholdValue>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|value| match value {
            ThresholdValue::Number(n) => Ok(n),
            ThresholdValue::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                serde::de::Error::custom(format!("threshold '{}' is not a number", s))
            }),
        })
        .collect()
}

impl SensorConfig {
    pub fn new(sensor_type: &str, active: bool, thresholds: &[f64]) -> Self {
        Self {
            sensor_type: sensor_type.to_string(),
            active,
            thresholds: thresholds.to_vec(),
        }
    }

    /// Returns `true` if the thresholds are in non-decreasing order, which the
    /// ascending classifier assumes.
    pub fn thresholds_sorted(&self) -> bool {
        self.thresholds.windows(2).all(|w| w[0] <= w[1])
    }
}

// ---------------------------------------------------------------------------
// Measurement types
// ---------------------------------------------------------------------------

/// One timestamped snapshot of all readings of a station.
///
/// Produced once per tick and handed straight to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub station_id: u32,
    pub timestamp: i64, // unix seconds
    pub readings: BTreeMap<String, f64>,
}

/// Discrete severity class ("Stufe") of a single reading.
///
/// Derived from a reading and never stored on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeverityLevel {
    /// 1-based level, `1..=thresholds.len() + 1`.
    Stufe(usize),
    /// No classification rule exists for the sensor type, or the value lies
    /// below the lowest boundary of a descending table.
    NotApplicable,
}

impl SeverityLevel {
    pub fn number(&self) -> Option<usize> {
        match self {
            SeverityLevel::Stufe(n) => Some(*n),
            SeverityLevel::NotApplicable => None,
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeverityLevel::Stufe(n) => write!(f, "Stufe {}", n),
            SeverityLevel::NotApplicable => write!(f, "n/a"),
        }
    }
}

/// A measurement together with the level of each of its readings.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub measurement: Measurement,
    pub levels: BTreeMap<String, SeverityLevel>,
}

impl Snapshot {
    pub fn level(&self, sensor_type: &str) -> SeverityLevel {
        self.levels
            .get(sensor_type)
            .copied()
            .unwrap_or(SeverityLevel::NotApplicable)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when loading the sensor configuration or settings.
///
/// Unknown sensor types during re-parametrization and missing classification
/// rules are deliberately absent: both are absorbed in steady state.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// The configuration file does not exist.
    NotFound(String),
    /// The file exists but could not be read.
    Unreadable { path: String, reason: String },
    /// The file was read but its contents could not be deserialized.
    Invalid { path: String, reason: String },
    /// The settings file or an environment override is malformed.
    Settings(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::Unreadable { path, reason } => {
                write!(f, "Config file {} could not be read: {}", path, reason)
            }
            ConfigError::Invalid { path, reason } => {
                write!(f, "Config file {} is invalid: {}", path, reason)
            }
            ConfigError::Settings(msg) => write!(f, "Settings error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_config_accepts_numeric_strings() {
        let json = r#"{"type": "PM10", "active": true, "threshold": [10, "20", " 25 "]}"#;
        let config: SensorConfig = serde_json::from_str(json).expect("valid record should parse");
        assert_eq!(config.sensor_type, "PM10");
        assert!(config.active);
        assert_eq!(config.thresholds, vec![10.0, 20.0, 25.0]);
    }

    #[test]
    fn test_sensor_config_rejects_non_numeric_threshold() {
        let json = r#"{"type": "PM10", "active": true, "threshold": [10, "hoch"]}"#;
        let result: Result<SensorConfig, _> = serde_json::from_str(json);
        assert!(result.is_err(), "'hoch' should not parse as a threshold");
    }

    #[test]
    fn test_sensor_config_defaults_when_fields_missing() {
        let config: SensorConfig =
            serde_json::from_str(r#"{"type": "O3"}"#).expect("minimal record should parse");
        assert!(config.active, "active defaults to true");
        assert!(config.thresholds.is_empty());
    }

    #[test]
    fn test_thresholds_sorted_detects_order() {
        assert!(SensorConfig::new(PM10, true, &[10.0, 20.0, 20.0, 50.0]).thresholds_sorted());
        assert!(!SensorConfig::new(PM10, true, &[10.0, 5.0]).thresholds_sorted());
        assert!(SensorConfig::new(PM10, true, &[]).thresholds_sorted());
    }

    #[test]
    fn test_severity_level_display() {
        assert_eq!(SeverityLevel::Stufe(3).to_string(), "Stufe 3");
        assert_eq!(SeverityLevel::NotApplicable.to_string(), "n/a");
        assert_eq!(SeverityLevel::Stufe(4).number(), Some(4));
        assert_eq!(SeverityLevel::NotApplicable.number(), None);
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::NotFound("config.json".to_string());
        assert_eq!(err.to_string(), "Config file not found: config.json");
    }
}
