pub mod constants;
pub mod error;
pub mod config;
pub mod track;
pub mod gating;
pub mod tracker;
pub mod coordinator;
pub mod output;
pub mod scheduler;
pub mod simulate;

pub use config::{Config, MeasurementNoise, ProcessNoise, TrackerConfig};
pub use coordinator::Coordinator;
pub use error::{ConfigError, NumericalError};
pub use scheduler::Scheduler;
pub use track::{Measurement, Track, TrackStatus, TrackedTarget};
pub use tracker::{TrackSnapshot, Tracker};
