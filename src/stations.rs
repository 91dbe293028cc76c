//! Station model and mobile fleet registry.
//!
//! A station holds an id and the current parameter (the "centre" value) of
//! each of its sensors. Measuring a station jitters around those centres
//! without touching them, so parameters only change through
//! `reparametrize`.
//!
//! `FLEET_SENSORS` is the single source of truth for which sensors a fleet
//! station carries and where their parameters start.

use crate::generator::{self, ValueSource, DEFAULT_JITTER};
use crate::logging::{self, Component};
use crate::model::{Measurement, CO, NO2, O3, PM10, PM2_5, SO2, TEMPERATURE};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Station
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    id: u32,
    sensors: BTreeMap<String, f64>,
}

impl Station {
    pub fn new<I, S>(id: u32, sensors: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            id,
            sensors: sensors.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn sensors(&self) -> &BTreeMap<String, f64> {
        &self.sensors
    }

    pub fn parameter(&self, sensor_type: &str) -> Option<f64> {
        self.sensors.get(sensor_type).copied()
    }

    /// Overwrites the parameters of known sensors.
    ///
    /// Keys that are not sensors of this station are ignored; they are not an
    /// error. Returns how many parameters were applied.
    pub fn reparametrize(&mut self, params: &BTreeMap<String, f64>) -> usize {
        let mut applied = 0;
        for (sensor_type, &value) in params {
            match self.sensors.get_mut(sensor_type) {
                Some(current) => {
                    *current = value;
                    applied += 1;
                }
                None => logging::debug(
                    Component::Station,
                    Some(self.id),
                    &format!("ignoring parameter for unknown sensor '{}'", sensor_type),
                ),
            }
        }
        applied
    }

    /// Snapshot of every sensor at `now`, jittered around the parameters.
    ///
    /// Does not modify the station.
    pub fn measure_at(&self, source: &mut dyn ValueSource, now: DateTime<Utc>) -> Measurement {
        let readings = self
            .sensors
            .iter()
            .map(|(sensor_type, &parameter)| {
                let value = generator::jittered(source, sensor_type, parameter, DEFAULT_JITTER);
                (sensor_type.clone(), value)
            })
            .collect();
        Measurement {
            station_id: self.id,
            timestamp: now.timestamp(),
            readings,
        }
    }

    /// Convenience wrapper that uses the real current time.
    /// Use `measure_at` in tests to keep them deterministic.
    pub fn measure(&self, source: &mut dyn ValueSource) -> Measurement {
        self.measure_at(source, Utc::now())
    }
}

// ---------------------------------------------------------------------------
// Fleet registry
// ---------------------------------------------------------------------------

/// Default number of mobile stations in a fleet simulation.
pub const DEFAULT_FLEET_SIZE: u32 = 10;

/// A sensor carried by every fleet station.
pub struct FleetSensor {
    pub sensor_type: &'static str,
    /// Parameter a station is created with before its first draw.
    pub baseline: f64,
    /// Range the initial parameter is drawn from at fleet start.
    pub initial_min: f64,
    pub initial_max: f64,
}

/// All sensors of a fleet station, in display order.
pub static FLEET_SENSORS: &[FleetSensor] = &[
    FleetSensor { sensor_type: TEMPERATURE, baseline: 15.0, initial_min: -10.0, initial_max: 35.0 },
    FleetSensor { sensor_type: NO2, baseline: 40.0, initial_min: 0.0, initial_max: 450.0 },
    FleetSensor { sensor_type: O3, baseline: 60.0, initial_min: 0.0, initial_max: 400.0 },
    FleetSensor { sensor_type: PM10, baseline: 25.0, initial_min: 0.0, initial_max: 160.0 },
    FleetSensor { sensor_type: PM2_5, baseline: 12.0, initial_min: 0.0, initial_max: 80.0 },
    FleetSensor { sensor_type: SO2, baseline: 20.0, initial_min: 0.0, initial_max: 520.0 },
    // mg/m³
    FleetSensor { sensor_type: CO, baseline: 0.5, initial_min: 0.0, initial_max: 10.0 },
];

/// Station at baseline parameters.
pub fn baseline_station(id: u32) -> Station {
    Station::new(id, FLEET_SENSORS.iter().map(|s| (s.sensor_type, s.baseline)))
}

/// Creates stations `1..=size` and gives each a random starting parameter
/// per sensor.
pub fn spawn_fleet(size: u32, source: &mut dyn ValueSource) -> Vec<Station> {
    (1..=size)
        .map(|id| {
            let mut station = baseline_station(id);
            let params: BTreeMap<String, f64> = FLEET_SENSORS
                .iter()
                .map(|s| {
                    let value = generator::round2(source.uniform(s.initial_min, s.initial_max));
                    (s.sensor_type.to_string(), value)
                })
                .collect();
            station.reparametrize(&params);
            station
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
