//! Configuration loading.
//!
//! Two inputs:
//! 1. The sensor configuration, a JSON array of `SensorConfig` records at a
//!    fixed path (`config.json` unless overridden).
//! 2. Runtime settings from an optional TOML file, `envmon.toml` or the path
//!    in `ENVMON_SETTINGS`, overridden by `ENVMON_*` environment variables
//!    (a `.env` file is loaded by the binary via `dotenv`).

use crate::generator::{BoundedShape, GeneratorMode, DEFAULT_JITTER};
use crate::logging::{self, Component, LogLevel};
use crate::model::{ConfigError, SensorConfig};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SENSOR_CONFIG: &str = "config.json";
pub const DEFAULT_SETTINGS_FILE: &str = "envmon.toml";

// ============================================================================
// Sensor configuration
// ============================================================================

/// What to do when the sensor configuration file is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigStrictness {
    /// Missing file is fatal.
    Strict,
    /// Missing file is logged and the dashboard starts with no sensors.
    Lenient,
}

impl FromStr for ConfigStrictness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" | "true" | "1" => Ok(ConfigStrictness::Strict),
            "lenient" | "false" | "0" => Ok(ConfigStrictness::Lenient),
            other => Err(format!("unknown strictness '{}'", other)),
        }
    }
}

/// Parses the JSON sensor configuration. `origin` names the source in errors.
pub fn parse_sensor_config(json: &str, origin: &str) -> Result<Vec<SensorConfig>, ConfigError> {
    let sensors: Vec<SensorConfig> = serde_json::from_str(json).map_err(|e| ConfigError::Invalid {
        path: origin.to_string(),
        reason: e.to_string(),
    })?;

    for sensor in sensors.iter().filter(|s| !s.thresholds_sorted()) {
        logging::warn(
            Component::Config,
            None,
            &format!(
                "thresholds for '{}' are not ascending; levels will follow list order",
                sensor.sensor_type
            ),
        );
    }
    Ok(sensors)
}

/// Loads the sensor configuration from `path`.
///
/// A missing file is `Err(NotFound)` when strict, and an empty configuration
/// (after a warning) when lenient. Unreadable or malformed files are errors
/// in both modes. Errors are returned unlogged; the caller owns the fatal
/// log line.
pub fn load_sensor_config(path: &Path, strictness: ConfigStrictness) -> Result<Vec<SensorConfig>, ConfigError> {
    let display = path.display().to_string();
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let err = ConfigError::NotFound(display);
            if strictness == ConfigStrictness::Strict {
                // fatal; the caller logs it once
                return Err(err);
            }
            logging::log_config_failure("Loading sensor configuration", &err, true);
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(ConfigError::Unreadable {
                path: display,
                reason: e.to_string(),
            });
        }
    };

    let sensors = parse_sensor_config(&contents, &display)?;
    logging::info(
        Component::Config,
        None,
        &format!("Loaded {} sensors from {}", sensors.len(), display),
    );
    Ok(sensors)
}

// ============================================================================
// Dashboard variants
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Fixed station, config sensors, uniform global-range readings.
    FixedStation,
    /// Config sensors the user can switch on and off.
    ToggleableSensors,
    /// Ten mobile stations, live air-quality table.
    Fleet,
}

/// How a variant's refresh loop is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduling {
    Cooperative,
    BackgroundThread,
}

impl Variant {
    pub fn default_period(&self) -> Duration {
        match self {
            Variant::FixedStation => Duration::from_millis(5000),
            Variant::ToggleableSensors => Duration::from_millis(1000),
            Variant::Fleet => Duration::from_millis(1750),
        }
    }

    pub fn scheduling(&self) -> Scheduling {
        match self {
            Variant::FixedStation | Variant::ToggleableSensors => Scheduling::Cooperative,
            Variant::Fleet => Scheduling::BackgroundThread,
        }
    }

    pub fn generator_mode(&self) -> GeneratorMode {
        match self {
            Variant::FixedStation => GeneratorMode::global_range(),
            Variant::ToggleableSensors => GeneratorMode::ThresholdBounded(BoundedShape::Triangular),
            Variant::Fleet => GeneratorMode::Jittered { spread: DEFAULT_JITTER },
        }
    }

    /// The fleet does not read the sensor configuration at all.
    pub fn default_strictness(&self) -> ConfigStrictness {
        match self {
            Variant::ToggleableSensors => ConfigStrictness::Strict,
            Variant::FixedStation | Variant::Fleet => ConfigStrictness::Lenient,
        }
    }

    pub fn uses_sensor_config(&self) -> bool {
        *self != Variant::Fleet
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fixed_station" | "fixed" => Ok(Variant::FixedStation),
            "toggleable_sensors" | "toggle" => Ok(Variant::ToggleableSensors),
            "fleet" => Ok(Variant::Fleet),
            other => Err(format!("unknown variant '{}'", other)),
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub timestamps: bool,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            timestamps: false,
        }
    }
}

/// Runtime settings.
///
/// ```toml
/// variant = "fleet"
/// sensor_config = "config.json"
/// strictness = "strict"      # defaults per variant
/// tick_interval_ms = 1750    # defaults per variant
/// fleet_size = 10
/// seed = 42                  # omit for entropy
/// colors = true
///
/// [logging]
/// level = "info"
/// file = "envmon.log"
/// timestamps = true
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    #[serde(default = "default_variant")]
    pub variant: Variant,
    #[serde(default = "default_sensor_config")]
    pub sensor_config: PathBuf,
    #[serde(default)]
    pub strictness: Option<ConfigStrictness>,
    #[serde(default)]
    pub tick_interval_ms: Option<u64>,
    #[serde(default = "default_fleet_size")]
    pub fleet_size: u32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_colors")]
    pub colors: bool,
    #[serde(default)]
    pub logging: LoggingSettings,
}

fn default_variant() -> Variant {
    Variant::FixedStation
}

fn default_sensor_config() -> PathBuf {
    PathBuf::from(DEFAULT_SENSOR_CONFIG)
}

fn default_fleet_size() -> u32 {
    crate::stations::DEFAULT_FLEET_SIZE
}

fn default_colors() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            variant: default_variant(),
            sensor_config: default_sensor_config(),
            strictness: None,
            tick_interval_ms: None,
            fleet_size: default_fleet_size(),
            seed: None,
            colors: default_colors(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Settings {
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Settings(e.to_string()))
    }

    /// Reads the settings file if it exists; a missing file means defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Settings(format!("{}: {}", path.display(), e))),
        }
    }

    /// Settings file named by `ENVMON_SETTINGS` (or the default), then
    /// environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var("ENVMON_SETTINGS").unwrap_or_else(|_| DEFAULT_SETTINGS_FILE.to_string());
        let mut settings = Self::load(Path::new(&path))?;
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Applies `ENVMON_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ENVMON_VARIANT") {
            self.variant = v.parse().map_err(ConfigError::Settings)?;
        }
        if let Some(v) = lookup("ENVMON_CONFIG") {
            self.sensor_config = PathBuf::from(v);
        }
        if let Some(v) = lookup("ENVMON_STRICT") {
            self.strictness = Some(v.parse().map_err(ConfigError::Settings)?);
        }
        if let Some(v) = lookup("ENVMON_TICK_MS") {
            self.tick_interval_ms = Some(parse_number(&v, "ENVMON_TICK_MS")?);
        }
        if let Some(v) = lookup("ENVMON_FLEET_SIZE") {
            self.fleet_size = parse_number(&v, "ENVMON_FLEET_SIZE")?;
        }
        if let Some(v) = lookup("ENVMON_SEED") {
            self.seed = Some(parse_number(&v, "ENVMON_SEED")?);
        }
        if let Some(v) = lookup("ENVMON_LOG_LEVEL") {
            self.logging.level = v.parse().map_err(ConfigError::Settings)?;
        }
        if let Some(v) = lookup("ENVMON_LOG_FILE") {
            self.logging.file = Some(v);
        }
        Ok(())
    }

    pub fn strictness(&self) -> ConfigStrictness {
        self.strictness.unwrap_or_else(|| self.variant.default_strictness())
    }

    pub fn period(&self) -> Duration {
        match self.tick_interval_ms {
            Some(ms) if ms > 0 => Duration::from_millis(ms),
            _ => self.variant.default_period(),
        }
    }
}

fn parse_number<T: FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Settings(format!("{} must be a number, got '{}'", key, value)))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_sensor_config_array() {
        let json = r#"[
            {"type": "PM10", "active": true, "threshold": [10, 20, 25, 50, 75, 100]},
            {"type": "O3", "active": false, "threshold": ["60", "120", "180"]}
        ]"#;
        let sensors = parse_sensor_config(json, "inline").expect("valid config should parse");
        assert_eq!(sensors.len(), 2);
        assert_eq!(sensors[1].thresholds, vec![60.0, 120.0, 180.0]);
        assert!(!sensors[1].active);
    }

    #[test]
    fn test_parse_sensor_config_invalid_json() {
        let result = parse_sensor_config("{not json", "inline");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })), "got {:?}", result);
    }

    #[test]
    fn test_variant_defaults() {
        assert_eq!(Variant::FixedStation.default_period(), Duration::from_millis(5000));
        assert_eq!(Variant::Fleet.scheduling(), Scheduling::BackgroundThread);
        assert_eq!(Variant::ToggleableSensors.scheduling(), Scheduling::Cooperative);
        assert_eq!(Variant::ToggleableSensors.default_strictness(), ConfigStrictness::Strict);
        assert!(!Variant::Fleet.uses_sensor_config());
    }

    #[test]
    fn test_variant_from_str_accepts_aliases() {
        assert_eq!("fleet".parse::<Variant>(), Ok(Variant::Fleet));
        assert_eq!("toggleable-sensors".parse::<Variant>(), Ok(Variant::ToggleableSensors));
        assert_eq!("Fixed".parse::<Variant>(), Ok(Variant::FixedStation));
        assert!("tkinter".parse::<Variant>().is_err());
    }

    #[test]
    fn test_settings_from_toml() {
        let toml = r#"
            variant = "fleet"
            tick_interval_ms = 250
            seed = 42

            [logging]
            level = "warn"
            timestamps = true
        "#;
        let settings = Settings::from_toml(toml).expect("valid settings should parse");
        assert_eq!(settings.variant, Variant::Fleet);
        assert_eq!(settings.period(), Duration::from_millis(250));
        assert_eq!(settings.seed, Some(42));
        assert_eq!(settings.fleet_size, 10);
        assert_eq!(settings.logging.level, LogLevel::Warning);
        assert!(settings.logging.timestamps);
        assert_eq!(settings.sensor_config, PathBuf::from(DEFAULT_SENSOR_CONFIG));
    }

    #[test]
    fn test_settings_from_toml_rejects_unknown_variant() {
        let result = Settings::from_toml(r#"variant = "tkinter""#);
        assert!(matches!(result, Err(ConfigError::Settings(_))));
    }

    #[test]
    fn test_empty_settings_use_variant_defaults() {
        let settings = Settings::from_toml("").expect("empty settings are valid");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.period(), Duration::from_millis(5000));
        assert_eq!(settings.strictness(), ConfigStrictness::Lenient);
    }

    #[test]
    fn test_zero_tick_interval_falls_back_to_default() {
        let mut settings = Settings::default();
        settings.tick_interval_ms = Some(0);
        assert_eq!(settings.period(), Variant::FixedStation.default_period());
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(lookup_from(&[
                ("ENVMON_VARIANT", "toggle"),
                ("ENVMON_STRICT", "lenient"),
                ("ENVMON_TICK_MS", "1200"),
                ("ENVMON_CONFIG", "/etc/envmon/sensors.json"),
                ("ENVMON_LOG_LEVEL", "debug"),
            ]))
            .expect("valid overrides");
        assert_eq!(settings.variant, Variant::ToggleableSensors);
        assert_eq!(settings.strictness(), ConfigStrictness::Lenient);
        assert_eq!(settings.period(), Duration::from_millis(1200));
        assert_eq!(settings.sensor_config, PathBuf::from("/etc/envmon/sensors.json"));
        assert_eq!(settings.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_malformed_override_is_an_error() {
        let mut settings = Settings::default();
        let result = settings.apply_overrides(lookup_from(&[("ENVMON_SEED", "abc")]));
        assert!(matches!(result, Err(ConfigError::Settings(_))), "got {:?}", result);
    }

    #[test]
    fn test_no_overrides_leave_settings_untouched() {
        let mut settings = Settings::default();
        settings.apply_overrides(|_| None).expect("no overrides");
        assert_eq!(settings, Settings::default());
    }
}
