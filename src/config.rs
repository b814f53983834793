//! TOML-based scenario configuration and preset definitions.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::model::band_controller::LINE_INPUTS;

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Outer clock and global parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Periodic controller parameters.
    #[serde(default)]
    pub controller: ControllerConfig,
    /// Line-voltage sensor parameters.
    #[serde(default)]
    pub sensors: SensorConfig,
    /// Simulated communication link between sensors and controllers.
    #[serde(default)]
    pub comm: CommConfig,
}

/// Outer clock and global parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of outer ticks to run (must be > 0).
    pub ticks: u64,
    /// Offset of model time, in ticks, relative to the outer clock.
    pub start_tick: u64,
    /// Model seconds per outer tick (must be > 0).
    pub seconds_per_tick: f64,
    /// Master random seed.
    pub seed: u64,
    /// Log every controller input and decision at `info`.
    pub verbose: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ticks: 36_000,
            start_tick: 0,
            seconds_per_tick: 0.1,
            seed: 42,
            verbose: false,
        }
    }
}

/// Periodic controller parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    /// Number of controlled transformers (must be > 0).
    pub count: usize,
    /// Seconds between decisions (must be > 0).
    pub period: f64,
    /// Offset of the decision grid in seconds; normalized into `[0, period)`.
    pub phase_shift: f64,
    /// Seconds of unresponsiveness after each decision (must be >= 0).
    pub dead_time: f64,
    /// Lower voltage band limit (p.u.).
    pub vlow: f64,
    /// Upper voltage band limit (p.u.).
    pub vup: f64,
    /// Lowest tap position.
    pub tap_min: i64,
    /// Highest tap position.
    pub tap_max: i64,
    /// Instance name passed to every model.
    pub instance_name: String,
    /// Model start-up timeout in milliseconds.
    pub timeout_ms: u64,
    /// Instants closer than this many seconds are equal (must be > 0).
    pub time_diff_resolution: f64,
    /// Value each controller input is primed with before the first reading.
    pub initial_input: f64,
    /// Bound the model's stop time to the end of the run.
    pub stop_time_defined: bool,
    /// Optional TOML self-description replacing the built-in one.
    pub model_description: Option<PathBuf>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            count: 1,
            period: 60.0,
            phase_shift: 1.0,
            dead_time: 2.0,
            vlow: 0.95,
            vup: 1.05,
            tap_min: -16,
            tap_max: 16,
            instance_name: "Controller1".to_string(),
            timeout_ms: 0,
            time_diff_resolution: 1e-9,
            initial_input: 1.0,
            stop_time_defined: false,
            model_description: None,
        }
    }
}

/// Line-voltage sensor parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorConfig {
    /// Number of measured lines per transformer (1 to 7).
    pub lines: usize,
    /// Seconds between published readings (must be > 0).
    pub period: f64,
    /// Offset of the first reading in seconds.
    pub phase_shift: f64,
    /// Voltage of the first line at tap 0 (p.u.).
    pub base_pu: f64,
    /// Voltage drop across the lines (p.u.).
    pub spread_pu: f64,
    /// Daily sinusoid amplitude (p.u.).
    pub amp_pu: f64,
    /// Gaussian noise standard deviation (p.u.).
    pub noise_std: f64,
    /// Voltage change per tap position (p.u.).
    pub tap_step_pu: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            lines: 7,
            period: 60.0,
            phase_shift: 0.0,
            base_pu: 0.97,
            spread_pu: 0.04,
            amp_pu: 0.02,
            noise_std: 0.002,
            tap_step_pu: 0.00625,
        }
    }
}

/// Simulated communication link between sensors and controllers.
///
/// Lines not listed in `routed_lines` reach the controller on the tick they
/// are published.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommConfig {
    /// 1-based line numbers whose readings travel over the link.
    pub routed_lines: Vec<usize>,
    /// Ticks between sending and delivery.
    pub latency_ticks: u64,
    /// Extra random delay of up to this many ticks per message.
    pub jitter_ticks: u64,
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.ticks"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl ScenarioConfig {
    /// Returns the baseline scenario: one controller, 60 s period, 2 s dead
    /// time, one hour at 10 ticks per second.
    pub fn baseline() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            controller: ControllerConfig::default(),
            sensors: SensorConfig::default(),
            comm: CommConfig::default(),
        }
    }

    /// Returns the slow-actuation preset: dead time longer than the period,
    /// so decision instants are missed.
    pub fn slow_actuation() -> Self {
        Self {
            simulation: SimulationConfig {
                ticks: 6_000,
                ..SimulationConfig::default()
            },
            controller: ControllerConfig {
                period: 30.0,
                dead_time: 45.0,
                ..ControllerConfig::default()
            },
            sensors: SensorConfig {
                period: 30.0,
                ..SensorConfig::default()
            },
            comm: CommConfig::default(),
        }
    }

    /// Returns the fast-sampling preset: three controllers, 1 s ticks,
    /// 10 s decisions with zero dead time.
    pub fn fast_sampling() -> Self {
        Self {
            simulation: SimulationConfig {
                ticks: 600,
                seconds_per_tick: 1.0,
                ..SimulationConfig::default()
            },
            controller: ControllerConfig {
                count: 3,
                period: 10.0,
                phase_shift: -9.0,
                dead_time: 0.0,
                ..ControllerConfig::default()
            },
            sensors: SensorConfig {
                period: 10.0,
                base_pu: 0.94,
                ..SensorConfig::default()
            },
            comm: CommConfig::default(),
        }
    }

    /// Returns the delayed-comm preset: the fast-sampling setup with the first
    /// line's readings arriving 3 to 5 ticks late, after the decision instant
    /// they were sampled for.
    pub fn delayed_comm() -> Self {
        Self {
            comm: CommConfig {
                routed_lines: vec![1],
                latency_ticks: 3,
                jitter_ticks: 2,
            },
            ..Self::fast_sampling()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "slow_actuation", "fast_sampling", "delayed_comm"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "slow_actuation" => Ok(Self::slow_actuation()),
            "fast_sampling" => Ok(Self::fast_sampling()),
            "delayed_comm" => Ok(Self::delayed_comm()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "scenario".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid. A dead time longer
    /// than the period is accepted.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &str, message: &str| {
            if !ok {
                errors.push(ConfigError {
                    field: field.into(),
                    message: message.into(),
                });
            }
        };

        let s = &self.simulation;
        check(s.ticks > 0, "simulation.ticks", "must be > 0");
        check(
            s.seconds_per_tick > 0.0 && s.seconds_per_tick.is_finite(),
            "simulation.seconds_per_tick",
            "must be > 0",
        );

        let c = &self.controller;
        check(c.count > 0, "controller.count", "must be > 0");
        check(
            c.period > 0.0 && c.period.is_finite(),
            "controller.period",
            "must be > 0",
        );
        check(c.phase_shift.is_finite(), "controller.phase_shift", "must be finite");
        check(
            c.dead_time >= 0.0 && c.dead_time.is_finite(),
            "controller.dead_time",
            "must be >= 0",
        );
        check(c.vlow < c.vup, "controller.vlow", "must be < controller.vup");
        check(c.tap_min <= c.tap_max, "controller.tap_min", "must be <= controller.tap_max");
        check(
            !c.instance_name.is_empty(),
            "controller.instance_name",
            "must not be empty",
        );
        check(
            c.time_diff_resolution > 0.0,
            "controller.time_diff_resolution",
            "must be > 0",
        );

        let sen = &self.sensors;
        check(
            (1..=LINE_INPUTS).contains(&sen.lines),
            "sensors.lines",
            "must be between 1 and 7",
        );
        check(
            sen.period > 0.0 && sen.period.is_finite(),
            "sensors.period",
            "must be > 0",
        );
        check(sen.noise_std >= 0.0, "sensors.noise_std", "must be >= 0");

        check(
            self.comm.routed_lines.iter().all(|l| (1..=sen.lines).contains(l)),
            "comm.routed_lines",
            "must name lines between 1 and sensors.lines",
        );

        errors
    }
}
