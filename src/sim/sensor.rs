//! Periodic line-voltage measurements fed to a controller.

use std::f64::consts::PI;

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::entity::first_grid_time;
use super::types::PortValues;
use crate::model::ScalarValue;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Shape of the line voltages a sensor measures, all in p.u.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageProfile {
    /// Voltage of the first line at tap 0
    pub base_pu: f64,
    /// Voltage drop across the lines
    pub spread_pu: f64,
    /// Daily sinusoid amplitude
    pub amp_pu: f64,
    /// Gaussian noise standard deviation
    pub noise_std: f64,
    /// Voltage change per tap position
    pub tap_step_pu: f64,
}

/// Generates line voltages downstream of a tap-changing transformer and
/// publishes them on a fixed period.
///
/// Line `i` (0-based) sits at `base_pu - spread_pu * i / lines`, follows a
/// daily sinusoid of amplitude `amp_pu` (each line phase-shifted a little),
/// carries Gaussian noise, and is raised by `tap_step_pu` per tap position.
#[derive(Debug, Clone)]
pub struct PeriodicSensor {
    /// Number of measured lines
    pub lines: usize,
    /// Seconds between published readings
    pub period: f64,
    pub profile: VoltageProfile,
    time_resolution: f64,
    next_send_time: f64,
    rng: StdRng,
}

impl PeriodicSensor {
    /// Creates a sensor whose first reading is published at the first
    /// instant `phase_shift + k * period` not before `start_time`.
    ///
    /// # Panics
    ///
    /// Panics if `lines` is zero or `period <= 0`.
    pub fn new(
        lines: usize,
        period: f64,
        phase_shift: f64,
        start_time: f64,
        profile: VoltageProfile,
        seed: u64,
    ) -> Self {
        assert!(lines > 0, "lines must be > 0");
        assert!(period > 0.0, "period must be > 0");
        let time_resolution = 1e-9;
        Self {
            lines,
            period,
            profile,
            time_resolution,
            next_send_time: first_grid_time(phase_shift, period, start_time, time_resolution),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Port alias of line `i` (0-based).
    pub fn port(i: usize) -> String {
        format!("u_line{}", i + 1)
    }

    /// True line voltages at `time_s` with the transformer at `tap`.
    pub fn measure(&mut self, time_s: f64, tap: i64) -> Vec<f64> {
        let day_angle = 2.0 * PI * time_s / SECONDS_PER_DAY;
        (0..self.lines)
            .map(|i| {
                let p = &self.profile;
                let offset = p.spread_pu * i as f64 / self.lines as f64;
                let shape = (day_angle + 0.2 * i as f64).sin();
                let noise = gaussian_noise(&mut self.rng, p.noise_std);
                p.base_pu - offset + p.amp_pu * shape + noise + p.tap_step_pu * tap as f64
            })
            .collect()
    }

    /// Returns the readings as port values if a publication is due at `time_s`.
    pub fn publish(&mut self, time_s: f64, voltages: &[f64]) -> Option<PortValues> {
        if (time_s - self.next_send_time).abs() > self.time_resolution {
            return None;
        }
        self.next_send_time += self.period;
        Some(
            voltages
                .iter()
                .enumerate()
                .map(|(i, &u)| (Self::port(i), ScalarValue::Real(u)))
                .collect(),
        )
    }
}

/// Gaussian noise with mean 0 via the Box-Muller transform.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    z0 * std_dev
}
