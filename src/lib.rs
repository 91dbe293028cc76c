//! Simulated environmental-sensor dashboard core.
//!
//! Generates placeholder readings for a fixed station or a fleet of mobile
//! stations, classifies them into "Stufe" severity levels, and drives a
//! periodic refresh loop that reports to a presentation layer.

pub mod alert;
pub mod config;
pub mod console;
pub mod generator;
pub mod logging;
pub mod model;
pub mod presentation;
pub mod scheduler;
pub mod simulation;
pub mod stations;
