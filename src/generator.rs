//! Simulated sensor value generation.
//!
//! All randomness goes through the `ValueSource` trait so that tests can
//! substitute a scripted sequence for entropy. Three generation modes exist,
//! one per dashboard variant:
//!
//! - Mode A (`Unconstrained`): uniform over a fixed global range.
//! - Mode B (`ThresholdBounded`): triangular or uniform over
//!   `[min(thresholds), max(thresholds)]`.
//! - Mode C (`Jittered`): uniform over `[max(0, p - spread), p + spread]`
//!   around a station parameter `p`; temperature passes through unchanged.

use crate::model::{SensorConfig, TEMPERATURE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Lower bound of the global range used by mode A.
pub const GLOBAL_MIN: f64 = -20.0;

/// Upper bound of the global range used by mode A.
pub const GLOBAL_MAX: f64 = 45.0;

/// Default half-width of the mode C jitter window.
pub const DEFAULT_JITTER: f64 = 5.0;

// ---------------------------------------------------------------------------
// Value sources
// ---------------------------------------------------------------------------

/// Source of random draws.
pub trait ValueSource {
    /// Uniform draw from the closed interval `[low, high]`.
    ///
    /// Implementations must return `low` when `high <= low`.
    fn uniform(&mut self, low: f64, high: f64) -> f64;

    /// Triangular draw on `[low, high]` peaking at `mode`, by inverse CDF.
    ///
    /// Works on half-widths so that `high - low` never has to be finite.
    fn triangular(&mut self, low: f64, high: f64, mode: f64) -> f64 {
        if high <= low {
            return low;
        }
        let mode = mode.clamp(low, high);
        let half = high * 0.5 - low * 0.5;
        let split = (mode * 0.5 - low * 0.5) / half;
        let u = self.uniform(0.0, 1.0);
        let t = if u < split {
            (split * u).sqrt()
        } else {
            1.0 - ((1.0 - split) * (1.0 - u)).sqrt()
        };
        (low + half * t + half * t).min(high)
    }
}

/// Entropy-backed source for live simulation.
pub struct RandomSource {
    rng: StdRng,
}

impl RandomSource {
    pub fn from_entropy() -> Self {
        Self { rng: StdRng::from_os_rng() }
    }

    /// Reproducible source; same seed, same sequence.
    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn from_seed_or_entropy(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }
}

impl ValueSource for RandomSource {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        let span = high - low;
        if !span.is_finite() {
            // interpolate instead; random_range rejects a non-finite span
            let u: f64 = self.rng.random_range(0.0..=1.0);
            return low * (1.0 - u) + high * u;
        }
        self.rng.random_range(low..=high)
    }
}

/// Deterministic source cycling through unit fractions.
///
/// Each draw takes the next fraction `f` (clamped to `[0, 1]`) and returns
/// `low * (1 - f) + high * f`. A fraction of `0.5` therefore lands on the
/// centre of every interval, which makes jittered readings equal to the
/// station parameter.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    fractions: Vec<f64>,
    next: usize,
}

impl ScriptedSource {
    /// An empty script behaves like `fixed(0.5)`.
    pub fn new(fractions: Vec<f64>) -> Self {
        let fractions = if fractions.is_empty() { vec![0.5] } else { fractions };
        Self { fractions, next: 0 }
    }

    pub fn fixed(fraction: f64) -> Self {
        Self::new(vec![fraction])
    }

    fn next_fraction(&mut self) -> f64 {
        let f = self.fractions[self.next % self.fractions.len()];
        self.next = self.next.wrapping_add(1);
        f.clamp(0.0, 1.0)
    }
}

impl ValueSource for ScriptedSource {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        let f = self.next_fraction();
        if high <= low {
            return low;
        }
        low * (1.0 - f) + high * f
    }
}

// ---------------------------------------------------------------------------
// Generation modes
// ---------------------------------------------------------------------------

/// Distribution used by mode B.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundedShape {
    /// Peak at the midpoint of the threshold range.
    Triangular,
    Uniform,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeneratorMode {
    Unconstrained { low: f64, high: f64 },
    ThresholdBounded(BoundedShape),
    Jittered { spread: f64 },
}

impl GeneratorMode {
    pub fn global_range() -> Self {
        GeneratorMode::Unconstrained { low: GLOBAL_MIN, high: GLOBAL_MAX }
    }
}

/// Rounds to two decimals, as readings are displayed.
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / 100.0
}

/// Mode A: uniform over `[low, high]`, rounded.
pub fn unconstrained(source: &mut dyn ValueSource, low: f64, high: f64) -> f64 {
    round2(source.uniform(low, high))
}

/// Mode B: draw between the smallest and largest threshold, rounded.
///
/// A sensor without thresholds falls back to the global range.
pub fn threshold_bounded(source: &mut dyn ValueSource, thresholds: &[f64], shape: BoundedShape) -> f64 {
    let low = thresholds.iter().copied().fold(f64::INFINITY, f64::min);
    let high = thresholds.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !low.is_finite() || !high.is_finite() {
        return unconstrained(source, GLOBAL_MIN, GLOBAL_MAX);
    }
    let value = match shape {
        BoundedShape::Triangular => source.triangular(low, high, (low + high) / 2.0),
        BoundedShape::Uniform => source.uniform(low, high),
    };
    round2(value)
}

/// Mode C: jitter around a station parameter.
///
/// The window is floored at zero: `[max(0, p - spread), p + spread]`.
/// Temperature is reported as the parameter itself.
pub fn jittered(source: &mut dyn ValueSource, sensor_type: &str, parameter: f64, spread: f64) -> f64 {
    if sensor_type == TEMPERATURE {
        return parameter;
    }
    let low = (parameter - spread).max(0.0);
    round2(source.uniform(low, parameter + spread))
}

/// Next reading for a config-driven sensor (modes A and B).
///
/// Mode C needs a station parameter and is served by `jittered`; passed here
/// it jitters around the midpoint of the sensor's thresholds.
pub fn generate(mode: GeneratorMode, sensor: &SensorConfig, source: &mut dyn ValueSource) -> f64 {
    match mode {
        GeneratorMode::Unconstrained { low, high } => unconstrained(source, low, high),
        GeneratorMode::ThresholdBounded(shape) => threshold_bounded(source, &sensor.thresholds, shape),
        GeneratorMode::Jittered { spread } => {
            let centre = match (sensor.thresholds.first(), sensor.thresholds.last()) {
                (Some(first), Some(last)) => (first + last) / 2.0,
                _ => 0.0,
            };
            jittered(source, &sensor.sensor_type, centre, spread)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
