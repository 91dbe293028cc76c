//! Threshold classification of sensor readings into "Stufe" levels.
//!
//! Two policies exist and are kept apart on purpose: the config-driven
//! ascending policy (`value <= boundary`, every value has a level) and the
//! fixed-table descending policy (`value >= boundary`, values under the
//! lowest boundary have none). They disagree on direction and on boundary
//! inclusivity, so neither is expressed in terms of the other.

use crate::alert::tables;
use crate::model::{Measurement, SensorConfig, SeverityLevel};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// Ascending-boundary policy.
///
/// Returns the 1-based index of the first boundary the value does not exceed,
/// or `thresholds.len() + 1` if it exceeds them all. A value equal to a
/// boundary belongs to that (lower) level. An empty list yields `Stufe 1`.
/// NaN never satisfies `<=` and therefore lands in the top level.
pub fn classify_ascending(value: f64, thresholds: &[f64]) -> SeverityLevel {
    let level = thresholds
        .iter()
        .position(|&boundary| value <= boundary)
        .map(|i| i + 1)
        .unwrap_or(thresholds.len() + 1);
    SeverityLevel::Stufe(level)
}

/// Fixed-table descending policy.
///
/// Scans from the highest boundary down and returns the level of the first
/// boundary the value reaches, numbered from the low end of the table:
/// with NO2 `[50, 100, 150, 200, 400, 1000]`, `120 -> Stufe 2` and
/// `1000 -> Stufe 6`. Values below the lowest boundary, and empty tables,
/// are `NotApplicable`.
pub fn classify_descending(value: f64, thresholds: &[f64]) -> SeverityLevel {
    thresholds
        .iter()
        .enumerate()
        .rev()
        .find(|&(_, &boundary)| value >= boundary)
        .map(|(i, _)| SeverityLevel::Stufe(i + 1))
        .unwrap_or(SeverityLevel::NotApplicable)
}

/// Classification rule attached to one sensor type.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationPolicy {
    Ascending(Vec<f64>),
    DescendingTable(&'static [f64]),
    /// No rule exists; every value is `NotApplicable`.
    Unclassified,
}

impl ClassificationPolicy {
    /// Ascending policy over the thresholds of a config record.
    pub fn from_config(config: &SensorConfig) -> Self {
        ClassificationPolicy::Ascending(config.thresholds.clone())
    }

    /// Descending policy over the standard table for `sensor_type`, if any.
    pub fn standard(sensor_type: &str) -> Self {
        match tables::standard_table(sensor_type) {
            Some(table) => ClassificationPolicy::DescendingTable(table),
            None => ClassificationPolicy::Unclassified,
        }
    }

    pub fn classify(&self, value: f64) -> SeverityLevel {
        match self {
            ClassificationPolicy::Ascending(thresholds) => classify_ascending(value, thresholds),
            ClassificationPolicy::DescendingTable(table) => classify_descending(value, table),
            ClassificationPolicy::Unclassified => SeverityLevel::NotApplicable,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-sensor classifier set
// ---------------------------------------------------------------------------

/// Maps sensor types to their classification policy.
///
/// Sensor types without an entry classify as `NotApplicable`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifierSet {
    policies: BTreeMap<String, ClassificationPolicy>,
}

impl ClassifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ascending policies from the thresholds in the sensor configuration.
    pub fn from_configs(configs: &[SensorConfig]) -> Self {
        let policies = configs
            .iter()
            .map(|c| (c.sensor_type.clone(), ClassificationPolicy::from_config(c)))
            .collect();
        Self { policies }
    }

    /// Descending policies from the fixed air-quality tables.
    pub fn standard_air_quality() -> Self {
        let policies = tables::CLASSIFIED_SENSORS
            .iter()
            .map(|s| (s.to_string(), ClassificationPolicy::standard(s)))
            .collect();
        Self { policies }
    }

    pub fn insert(&mut self, sensor_type: &str, policy: ClassificationPolicy) {
        self.policies.insert(sensor_type.to_string(), policy);
    }

    pub fn policy(&self, sensor_type: &str) -> Option<&ClassificationPolicy> {
        self.policies.get(sensor_type)
    }

    pub fn classify(&self, sensor_type: &str, value: f64) -> SeverityLevel {
        self.policies
            .get(sensor_type)
            .map(|p| p.classify(value))
            .unwrap_or(SeverityLevel::NotApplicable)
    }

    /// Classifies every reading of a measurement.
    pub fn classify_measurement(&self, measurement: &Measurement) -> BTreeMap<String, SeverityLevel> {
        measurement
            .readings
            .iter()
            .map(|(sensor, &value)| (sensor.clone(), self.classify(sensor, value)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
