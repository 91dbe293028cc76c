//! Structured logging for the sensor simulation
//!
//! Provides context-rich logging with component and station identifiers,
//! timestamps, and severity levels. Supports both console output
//! and file-based logging for long simulation runs.

use crate::model::ConfigError;
use chrono::Utc;
use serde::Deserialize;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Config,
    Station,
    Scheduler,
    Console,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Config => write!(f, "CFG"),
            Component::Station => write!(f, "STN"),
            Component::Scheduler => write!(f, "SCHED"),
            Component::Console => write!(f, "UI"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the run can continue in a degraded form
    Expected,
    /// Unexpected failure - the run cannot continue
    Unexpected,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut global) = LOGGER.lock() {
            *global = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, component: Component, station_id: Option<u32>, message: &str) {
        if level < self.min_level {
            return;
        }

        let log_entry = format_entry(level, component, station_id, message);
        let station_part = station_id.map(|id| format!(" [station {}]", id)).unwrap_or_default();

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", component, station_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", component, station_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}{}: {}", component, station_part, message),
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

/// Formats one log line: `<utc timestamp> <LEVEL> <COMPONENT>[ [station N]]: <message>`
pub fn format_entry(level: LogLevel, component: Component, station_id: Option<u32>, message: &str) -> String {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    let station_part = station_id.map(|id| format!(" [station {}]", id)).unwrap_or_default();
    format!("{} {} {}{}: {}", timestamp, level, component, station_part, message)
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, component: Component, station_id: Option<u32>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, component, station_id, message);
        }
    }
}

/// Log a general informational message
pub fn info(component: Component, station_id: Option<u32>, message: &str) {
    emit(LogLevel::Info, component, station_id, message);
}

/// Log a warning message
pub fn warn(component: Component, station_id: Option<u32>, message: &str) {
    emit(LogLevel::Warning, component, station_id, message);
}

/// Log an error message
pub fn error(component: Component, station_id: Option<u32>, message: &str) {
    emit(LogLevel::Error, component, station_id, message);
}

/// Log a debug message
pub fn debug(component: Component, station_id: Option<u32>, message: &str) {
    emit(LogLevel::Debug, component, station_id, message);
}

// ---------------------------------------------------------------------------
// Config Failure Logging
// ---------------------------------------------------------------------------

/// Classify a configuration load failure.
///
/// A missing file is only survivable when the caller runs lenient; anything
/// else means the file is there but unusable.
pub fn classify_config_failure(err: &ConfigError, lenient: bool) -> FailureType {
    match err {
        ConfigError::NotFound(_) if lenient => FailureType::Expected,
        _ => FailureType::Unexpected,
    }
}

/// Log a configuration failure with classification
pub fn log_config_failure(operation: &str, err: &ConfigError, lenient: bool) {
    let failure_type = classify_config_failure(err, lenient);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => warn(Component::Config, None, &message),
        FailureType::Unexpected => error(Component::Config, None, &message),
    }
}

// ---------------------------------------------------------------------------
// Run Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of one simulation session
pub fn log_run_summary(component: Component, ticks: u64, snapshots: u64) {
    let message = format!(
        "Simulation stopped: {} ticks, {} snapshots emitted",
        ticks,
        snapshots
    );

    if ticks > 0 && snapshots == 0 {
        // ticking without output means every sensor was switched off
        warn(component, None, &message);
    } else {
        info(component, None, &message);
    }
}
