//! Severity classification of sensor readings.
//!
//! Submodules:
//! - `thresholds`: ascending and descending classification policies and the
//!   per-sensor-type classifier set.
//! - `tables`: fixed air-quality breakpoint tables for the mobile fleet.

pub mod tables;
pub mod thresholds;
