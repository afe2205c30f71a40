use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ConfigError;
use crate::gating::chi_square_gate;

/// Radar tracker configuration
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Squared Mahalanobis distance below which a detection is accepted by a track.
    #[arg(long, default_value_t = DEFAULT_GATE_THRESHOLD)]
    pub gate_threshold: f64,

    /// Derive the gate from the chance (0..1) that a true detection passes it.
    /// Overrides --gate-threshold.
    #[arg(long)]
    pub gate_probability: Option<f64>,

    /// Radial acceleration process noise (m/s^2).
    #[arg(long, default_value_t = DEFAULT_ACCEL_NOISE)]
    pub accel_noise: f64,

    /// Azimuth process noise (deg/sqrt(s)).
    #[arg(long, default_value_t = DEFAULT_AZIMUTH_NOISE)]
    pub azimuth_noise: f64,

    /// Elevation process noise (deg/sqrt(s)).
    #[arg(long, default_value_t = DEFAULT_ELEVATION_NOISE)]
    pub elevation_noise: f64,

    /// Range measurement sigma (m).
    #[arg(long, default_value_t = DEFAULT_RANGE_SIGMA)]
    pub range_sigma: f64,

    /// Radial speed measurement sigma (m/s).
    #[arg(long, default_value_t = DEFAULT_SPEED_SIGMA)]
    pub speed_sigma: f64,

    /// Azimuth measurement sigma (deg).
    #[arg(long, default_value_t = DEFAULT_AZIMUTH_SIGMA)]
    pub azimuth_sigma: f64,

    /// Elevation measurement sigma (deg).
    #[arg(long, default_value_t = DEFAULT_ELEVATION_SIGMA)]
    pub elevation_sigma: f64,

    /// Initial track sigma as a multiple of the measurement sigma.
    #[arg(long, default_value_t = DEFAULT_INITIAL_SIGMA_SCALE)]
    pub initial_sigma_scale: f64,

    /// Seconds a track must exist before it is reported.
    #[arg(long, default_value_t = DEFAULT_CONFIRMATION_AGE)]
    pub confirmation_age: f64,

    /// Seconds without an accepted detection before a track is dropped.
    #[arg(long, default_value_t = DEFAULT_STALENESS_TIMEOUT)]
    pub staleness_timeout: f64,

    /// Predict/publish rate (Hz).
    #[arg(long, default_value_t = DEFAULT_TICK_FREQUENCY)]
    pub tick_frequency: f64,

    /// Initial track pool capacity (sizing hint only).
    #[arg(long, default_value_t = DEFAULT_POOL_CAPACITY)]
    pub pool_capacity: usize,

    /// Status logging interval in seconds, -1 to disable
    #[arg(long, default_value_t = 5, allow_negative_numbers = true)]
    pub status_interval: i32,

    /// Number of simulated targets fed to the tracker.
    #[arg(long, default_value_t = 3)]
    pub sim_targets: usize,

    /// Simulated sensor frame rate (Hz).
    #[arg(long, default_value_t = 15.0)]
    pub sensor_rate: f64,

    /// Mean number of clutter detections per simulated frame.
    #[arg(long, default_value_t = 0.5)]
    pub clutter_rate: f64,

    /// Random seed for the simulated sensor.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Stop after this many seconds (runs until Ctrl+C when omitted).
    #[arg(long)]
    pub duration: Option<f64>,

    /// Verbose logging (DEBUG level)
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Measurement noise sigmas from the command line
    pub fn measurement_noise(&self) -> MeasurementNoise {
        MeasurementNoise {
            range: self.range_sigma,
            speed: self.speed_sigma,
            azimuth: self.azimuth_sigma,
            elevation: self.elevation_sigma,
        }
    }

    /// Build and validate the immutable tracker configuration.
    pub fn tracker_config(&self) -> Result<TrackerConfig, ConfigError> {
        let measurement_noise = self.measurement_noise();
        let gate_threshold = match self.gate_probability {
            Some(p) => chi_square_gate(p)?,
            None => self.gate_threshold,
        };
        let config = TrackerConfig {
            gate_threshold,
            process_noise: ProcessNoise {
                acceleration: self.accel_noise,
                azimuth: self.azimuth_noise,
                elevation: self.elevation_noise,
            },
            measurement_noise,
            initial_uncertainty: measurement_noise.scaled(self.initial_sigma_scale),
            confirmation_age: seconds("confirmation_age", self.confirmation_age)?,
            staleness_timeout: seconds("staleness_timeout", self.staleness_timeout)?,
            tick_frequency_hz: self.tick_frequency,
            initial_pool_capacity_hint: self.pool_capacity,
        };
        config.validate()?;
        Ok(config)
    }
}

fn seconds(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidDuration { name, value })
}

/// Process noise of the constant-radial-velocity model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessNoise {
    /// Radial acceleration (m/s^2), drives range and speed
    pub acceleration: f64,
    /// Azimuth random walk (deg/sqrt(s))
    pub azimuth: f64,
    /// Elevation random walk (deg/sqrt(s))
    pub elevation: f64,
}

/// Per-field 1-sigma noise in measurement space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementNoise {
    pub range: f64,
    pub speed: f64,
    pub azimuth: f64,
    pub elevation: f64,
}

impl MeasurementNoise {
    pub fn scaled(&self, factor: f64) -> Self {
        MeasurementNoise {
            range: self.range * factor,
            speed: self.speed * factor,
            azimuth: self.azimuth * factor,
            elevation: self.elevation * factor,
        }
    }

    /// Squared sigmas, in state order [range, speed, azimuth, elevation]
    pub fn variances(&self) -> [f64; 4] {
        [
            self.range.powi(2),
            self.speed.powi(2),
            self.azimuth.powi(2),
            self.elevation.powi(2),
        ]
    }

    fn fields(&self) -> [(&'static str, f64); 4] {
        [
            ("range", self.range),
            ("speed", self.speed),
            ("azimuth", self.azimuth),
            ("elevation", self.elevation),
        ]
    }
}

/// Tracker configuration, fixed at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub gate_threshold: f64,
    pub process_noise: ProcessNoise,
    pub measurement_noise: MeasurementNoise,
    /// 1-sigma of a freshly created track
    pub initial_uncertainty: MeasurementNoise,
    pub confirmation_age: Duration,
    pub staleness_timeout: Duration,
    pub tick_frequency_hz: f64,
    pub initial_pool_capacity_hint: usize,
}

impl TrackerConfig {
    /// Check the configuration for values that would break the filter or the scheduler.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.gate_threshold.is_finite() && self.gate_threshold > 0.0) {
            return Err(ConfigError::NonPositiveGate(self.gate_threshold));
        }
        if !(self.tick_frequency_hz.is_finite() && self.tick_frequency_hz > 0.0) {
            return Err(ConfigError::NonPositiveFrequency(self.tick_frequency_hz));
        }
        if self.confirmation_age > self.staleness_timeout {
            return Err(ConfigError::InvertedTimeouts {
                confirmation: self.confirmation_age,
                staleness: self.staleness_timeout,
            });
        }

        // Zero process noise is a valid (rigid) model; measurement and initial noise must be positive
        let process = [
            ("process.acceleration", self.process_noise.acceleration),
            ("process.azimuth", self.process_noise.azimuth),
            ("process.elevation", self.process_noise.elevation),
        ];
        for (name, value) in process {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidNoise { name, value });
            }
        }
        for (name, value) in self.measurement_noise.fields() {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidNoise { name, value });
            }
        }
        for (_, value) in self.initial_uncertainty.fields() {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidNoise { name: "initial_uncertainty", value });
            }
        }
        Ok(())
    }

    /// Nominal tick period
    pub fn tick_period(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.tick_frequency_hz)
            .unwrap_or(Duration::from_secs(u32::MAX as u64))
            .max(Duration::from_micros(1))
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        let measurement_noise = MeasurementNoise {
            range: DEFAULT_RANGE_SIGMA,
            speed: DEFAULT_SPEED_SIGMA,
            azimuth: DEFAULT_AZIMUTH_SIGMA,
            elevation: DEFAULT_ELEVATION_SIGMA,
        };
        TrackerConfig {
            gate_threshold: DEFAULT_GATE_THRESHOLD,
            process_noise: ProcessNoise {
                acceleration: DEFAULT_ACCEL_NOISE,
                azimuth: DEFAULT_AZIMUTH_NOISE,
                elevation: DEFAULT_ELEVATION_NOISE,
            },
            measurement_noise,
            initial_uncertainty: measurement_noise.scaled(DEFAULT_INITIAL_SIGMA_SCALE),
            confirmation_age: Duration::from_secs_f64(DEFAULT_CONFIRMATION_AGE),
            staleness_timeout: Duration::from_secs_f64(DEFAULT_STALENESS_TIMEOUT),
            tick_frequency_hz: DEFAULT_TICK_FREQUENCY,
            initial_pool_capacity_hint: DEFAULT_POOL_CAPACITY,
        }
    }
}
