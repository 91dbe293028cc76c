//! What a refresh tick does for each dashboard variant.
//!
//! `SensorPanel` drives the config-based fixed-station and toggle variants;
//! `FleetSimulation` drives the ten-station mobile fleet. Both only produce
//! snapshots; timing lives in `scheduler`.

use crate::alert::thresholds::ClassifierSet;
use crate::generator::{self, GeneratorMode, ValueSource};
use crate::model::{Measurement, SensorConfig, Snapshot};
use crate::presentation::PresentationSink;
use crate::stations::{self, Station};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Station id reported by the config-driven panel variants.
pub const FIXED_STATION_ID: u32 = 1;

/// One refresh tick's worth of work.
pub trait Simulation {
    /// Regenerates readings, classifies them and returns the snapshots to
    /// hand to the presentation layer.
    fn tick(&mut self, now: DateTime<Utc>) -> Vec<Snapshot>;
}

// ---------------------------------------------------------------------------
// Config-driven panel
// ---------------------------------------------------------------------------

pub struct SensorPanel {
    sensors: Vec<SensorConfig>,
    classifiers: ClassifierSet,
    mode: GeneratorMode,
    source: Box<dyn ValueSource + Send>,
}

impl SensorPanel {
    pub fn new(sensors: Vec<SensorConfig>, mode: GeneratorMode, source: Box<dyn ValueSource + Send>) -> Self {
        let classifiers = ClassifierSet::from_configs(&sensors);
        Self { sensors, classifiers, mode, source }
    }

    pub fn sensors(&self) -> &[SensorConfig] {
        &self.sensors
    }

    pub fn is_active(&self, sensor_type: &str) -> Option<bool> {
        self.sensors
            .iter()
            .find(|s| s.sensor_type == sensor_type)
            .map(|s| s.active)
    }

    /// Flips the `active` flag of a sensor and reports it to `sink`.
    ///
    /// Returns the new state, or `None` (and emits nothing) when the sensor
    /// type is not configured.
    pub fn toggle(&mut self, sensor_type: &str, sink: &mut dyn PresentationSink) -> Option<bool> {
        let sensor = self.sensors.iter_mut().find(|s| s.sensor_type == sensor_type)?;
        sensor.active = !sensor.active;
        let active = sensor.active;
        sink.on_sensor_toggled(sensor_type, active);
        Some(active)
    }
}

impl Simulation for SensorPanel {
    /// One snapshot covering every active sensor; none when all are off.
    fn tick(&mut self, now: DateTime<Utc>) -> Vec<Snapshot> {
        let mut readings = BTreeMap::new();
        for sensor in self.sensors.iter().filter(|s| s.active) {
            let value = generator::generate(self.mode, sensor, self.source.as_mut());
            readings.insert(sensor.sensor_type.clone(), value);
        }
        if readings.is_empty() {
            return Vec::new();
        }

        let measurement = Measurement {
            station_id: FIXED_STATION_ID,
            timestamp: now.timestamp(),
            readings,
        };
        let levels = self.classifiers.classify_measurement(&measurement);
        vec![Snapshot { measurement, levels }]
    }
}

// ---------------------------------------------------------------------------
// Mobile station fleet
// ---------------------------------------------------------------------------

pub struct FleetSimulation {
    stations: Vec<Station>,
    classifiers: ClassifierSet,
    source: Box<dyn ValueSource + Send>,
}

impl FleetSimulation {
    pub fn new(stations: Vec<Station>, source: Box<dyn ValueSource + Send>) -> Self {
        Self {
            stations,
            classifiers: ClassifierSet::standard_air_quality(),
            source,
        }
    }

    /// Fleet of `size` stations with randomised starting parameters.
    pub fn spawn(size: u32, mut source: Box<dyn ValueSource + Send>) -> Self {
        let stations = stations::spawn_fleet(size, source.as_mut());
        Self::new(stations, source)
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Re-parametrizes one station; returns the number of parameters applied,
    /// or `None` for an unknown station id.
    pub fn reparametrize(&mut self, station_id: u32, params: &BTreeMap<String, f64>) -> Option<usize> {
        self.stations
            .iter_mut()
            .find(|s| s.id() == station_id)
            .map(|s| s.reparametrize(params))
    }
}

impl Simulation for FleetSimulation {
    /// One snapshot per station, in station order.
    fn tick(&mut self, now: DateTime<Utc>) -> Vec<Snapshot> {
        let mut snapshots = Vec::with_capacity(self.stations.len());
        for station in &self.stations {
            let measurement = station.measure_at(self.source.as_mut(), now);
            let levels = self.classifiers.classify_measurement(&measurement);
            snapshots.push(Snapshot { measurement, levels });
        }
        snapshots
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
