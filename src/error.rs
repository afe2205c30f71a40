// Error types for the tracker
// Numerical errors are recovered per track/detection; configuration errors are fatal at startup.

use thiserror::Error;

/// Numerical failure inside a single filter step.
///
/// These never escape `Tracker::ingest` or `Tracker::tick`: the offending
/// track or detection is skipped for the current cycle and a warning is logged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumericalError {
    /// Innovation covariance is singular or not positive definite
    #[error("innovation covariance of track {track_id} is not invertible")]
    SingularInnovation { track_id: u64 },

    /// Prediction step was negative or not finite
    #[error("invalid prediction time step {dt}")]
    InvalidTimeStep { dt: f64 },

    /// Detection carries NaN or infinite fields
    #[error("detection {index} has non-finite fields")]
    NonFiniteMeasurement { index: usize },
}

/// Invalid startup configuration. Prevents the tracker from being built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("gate threshold must be positive and finite (got {0})")]
    NonPositiveGate(f64),

    #[error("gate probability must lie strictly between 0 and 1 (got {0})")]
    InvalidGateProbability(f64),

    #[error("tick frequency must be positive and finite (got {0} Hz)")]
    NonPositiveFrequency(f64),

    #[error("confirmation age {confirmation:?} exceeds staleness timeout {staleness:?}")]
    InvertedTimeouts {
        confirmation: std::time::Duration,
        staleness: std::time::Duration,
    },

    #[error("noise parameter `{name}` is invalid (got {value})")]
    InvalidNoise { name: &'static str, value: f64 },

    #[error("duration `{name}` must be non-negative and finite (got {value} s)")]
    InvalidDuration { name: &'static str, value: f64 },
}
