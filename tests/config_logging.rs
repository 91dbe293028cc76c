//! Log output of sensor configuration loading
//!
//! Kept in its own test binary: it installs the global logger with a log
//! file, which would otherwise collect lines from unrelated tests.

use envmon_sim::config::{load_sensor_config, ConfigStrictness};
use envmon_sim::logging::{self, init_logger, Component, LogLevel};
use std::fs;
use std::path::Path;

#[test]
fn test_missing_config_logging_by_strictness() {
    let dir = tempfile::tempdir().expect("temp dir should be creatable");
    let log_path = dir.path().join("envmon.log");
    init_logger(LogLevel::Debug, log_path.to_str(), true);

    let strict_path = Path::new("/nonexistent/envmon/strict.json");
    let lenient_path = Path::new("/nonexistent/envmon/lenient.json");
    assert!(load_sensor_config(strict_path, ConfigStrictness::Strict).is_err());
    assert!(load_sensor_config(lenient_path, ConfigStrictness::Lenient).is_ok());

    // what the binary does with a fatal startup error
    if let Err(e) = load_sensor_config(strict_path, ConfigStrictness::Strict) {
        logging::error(Component::System, None, &format!("Startup failed: {}", e));
    }

    let log = fs::read_to_string(&log_path).expect("log file should have been written");
    let strict_lines: Vec<&str> = log.lines().filter(|l| l.contains("strict.json")).collect();
    assert_eq!(
        strict_lines.len(),
        1,
        "a fatal missing config should be logged exactly once, got {:?}",
        strict_lines
    );
    assert!(strict_lines[0].contains("ERROR SYS: Startup failed"), "got '{}'", strict_lines[0]);

    let lenient_lines: Vec<&str> = log.lines().filter(|l| l.contains("lenient.json")).collect();
    assert_eq!(lenient_lines.len(), 1, "got {:?}", lenient_lines);
    assert!(
        lenient_lines[0].contains("WARN CFG: Loading sensor configuration failed [EXPECTED]"),
        "got '{}'",
        lenient_lines[0]
    );
}
