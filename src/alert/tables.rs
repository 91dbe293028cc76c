//! Fixed air-quality breakpoint tables.
//!
//! Each table lists the lower boundary of levels 1 through 6 in ascending
//! order, in µg/m³. They are consumed by the descending classifier: a value
//! below the first boundary has no class.

use crate::model::{NO2, O3, PM10, PM2_5, SO2};

pub const NO2_BREAKPOINTS: &[f64] = &[50.0, 100.0, 150.0, 200.0, 400.0, 1000.0];

pub const O3_BREAKPOINTS: &[f64] = &[50.0, 100.0, 130.0, 240.0, 380.0, 800.0];

pub const PM10_BREAKPOINTS: &[f64] = &[20.0, 40.0, 50.0, 100.0, 150.0, 1200.0];

pub const PM2_5_BREAKPOINTS: &[f64] = &[10.0, 20.0, 25.0, 50.0, 75.0, 800.0];

pub const SO2_BREAKPOINTS: &[f64] = &[100.0, 200.0, 350.0, 500.0, 750.0, 1250.0];

/// Returns the fixed breakpoint table for a sensor type, or `None` when the
/// standard defines no air-quality class for it (CO, temperature).
pub fn standard_table(sensor_type: &str) -> Option<&'static [f64]> {
    match sensor_type {
        NO2 => Some(NO2_BREAKPOINTS),
        O3 => Some(O3_BREAKPOINTS),
        PM10 => Some(PM10_BREAKPOINTS),
        PM2_5 => Some(PM2_5_BREAKPOINTS),
        SO2 => Some(SO2_BREAKPOINTS),
        _ => None,
    }
}

/// Sensor types with a standard table, in display order.
pub const CLASSIFIED_SENSORS: &[&str] = &[NO2, O3, PM10, PM2_5, SO2];
