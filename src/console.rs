//! Plain-text presentation layer for the `envmon` binary.
//!
//! Renders snapshots as table rows on any `Write` and parses the line
//! commands typed on stdin. Display-only rules live here and nowhere else:
//! CO and SO2 never show negative values, and levels are colour-coded.

use crate::logging::{self, Component};
use crate::model::{SeverityLevel, Snapshot, CO, SO2};
use crate::presentation::PresentationSink;
use crate::scheduler::SimulationState;
use chrono::{Local, TimeZone};
use std::io::Write;

const RESET: &str = "\x1b[0m";

/// ANSI colour for a level: green for the cleanest air through magenta.
pub fn level_color(level: SeverityLevel) -> Option<&'static str> {
    match level {
        SeverityLevel::Stufe(1) => Some("\x1b[32m"),
        SeverityLevel::Stufe(2) => Some("\x1b[92m"),
        SeverityLevel::Stufe(3) => Some("\x1b[33m"),
        SeverityLevel::Stufe(4) => Some("\x1b[91m"),
        SeverityLevel::Stufe(5) => Some("\x1b[31m"),
        SeverityLevel::Stufe(_) => Some("\x1b[35m"),
        SeverityLevel::NotApplicable => None,
    }
}

/// Value as shown on screen. CO and SO2 are clamped at zero.
pub fn display_value(sensor_type: &str, value: f64) -> f64 {
    if sensor_type == CO || sensor_type == SO2 {
        value.max(0.0)
    } else {
        value
    }
}

/// `%Y-%m-%d %H:%M:%S` in local time.
pub fn format_timestamp(timestamp: i64) -> String {
    match Local.timestamp_opt(timestamp, 0).single() {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => timestamp.to_string(),
    }
}

/// How snapshots are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One row per sensor: `Zeit | Sensor | Wert | Status`.
    SensorRows,
    /// One row per station with every sensor side by side.
    StationRows,
}

pub struct ConsoleSink<W: Write> {
    out: W,
    layout: Layout,
    colors: bool,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W, layout: Layout, colors: bool) -> Self {
        Self { out, layout, colors }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, level: SeverityLevel) -> String {
        match (self.colors, level_color(level)) {
            (true, Some(color)) => format!("{}{}{}", color, level, RESET),
            _ => level.to_string(),
        }
    }

    pub fn write_header(&mut self) {
        let header = match self.layout {
            Layout::SensorRows => format!("{:<19} | {:<10} | {:>8} | Status", "Zeit", "Sensor", "Wert"),
            Layout::StationRows => format!("{:<7} | {:<19} | Messwerte", "Station", "Zeit"),
        };
        self.write_line(&header);
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{}", line) {
            logging::warn(Component::Console, None, &format!("could not write output: {}", e));
        }
    }

    fn render(&self, snapshot: &Snapshot) -> Vec<String> {
        let m = &snapshot.measurement;
        let time = format_timestamp(m.timestamp);
        match self.layout {
            Layout::SensorRows => m
                .readings
                .iter()
                .map(|(sensor, &value)| {
                    format!(
                        "{:<19} | {:<10} | {:>8.2} | {}",
                        time,
                        sensor,
                        display_value(sensor, value),
                        self.paint(snapshot.level(sensor))
                    )
                })
                .collect(),
            Layout::StationRows => {
                let cells: Vec<String> = m
                    .readings
                    .iter()
                    .map(|(sensor, &value)| {
                        let level = snapshot.level(sensor);
                        if level == SeverityLevel::NotApplicable {
                            format!("{} {:.2}", sensor, display_value(sensor, value))
                        } else {
                            format!("{} {:.2} [{}]", sensor, display_value(sensor, value), self.paint(level))
                        }
                    })
                    .collect();
                vec![format!("{:<7} | {:<19} | {}", m.station_id, time, cells.join("  "))]
            }
        }
    }
}

impl<W: Write> PresentationSink for ConsoleSink<W> {
    fn on_measurement(&mut self, snapshot: &Snapshot) {
        for line in self.render(snapshot) {
            self.write_line(&line);
        }
    }

    fn on_sensor_toggled(&mut self, sensor_type: &str, active: bool) {
        let state = if active { "aktiviert" } else { "deaktiviert" };
        self.write_line(&format!("-- {} {}", sensor_type, state));
    }

    fn on_simulation_state_changed(&mut self, state: SimulationState) {
        self.write_line(&format!("-- Simulation {}", state));
        if state == SimulationState::Running {
            self.write_header();
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Toggle(String),
    Quit,
}

impl Command {
    /// Parses one input line. Blank or unrecognised lines give `None`.
    pub fn parse(line: &str) -> Option<Command> {
        let mut words = line.split_whitespace();
        let verb = words.next()?.to_ascii_lowercase();
        match verb.as_str() {
            "start" => Some(Command::Start),
            "stop" => Some(Command::Stop),
            "toggle" => words.next().map(|s| Command::Toggle(s.to_string())),
            "quit" | "exit" | "q" => Some(Command::Quit),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
