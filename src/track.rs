// Radar target track
// Constant-radial-velocity Kalman filter over [range, speed, azimuth, elevation]

use std::time::Duration;

use nalgebra::{Matrix4, Vector4};
use serde::{Deserialize, Serialize};

use crate::config::{MeasurementNoise, ProcessNoise, TrackerConfig};
use crate::error::NumericalError;

/// A single radar detection
///
/// Measurement space and state space share coordinates, so the observation
/// matrix is the identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Range (m)
    pub range: f64,
    /// Radial speed (m/s, negative when approaching)
    pub radial_speed: f64,
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
    /// Signal quality (SNR) reported by the sensor; not used for association
    pub signal_quality: f64,
}

impl Measurement {
    pub fn new(range: f64, radial_speed: f64, azimuth_deg: f64, elevation_deg: f64) -> Self {
        Measurement {
            range,
            radial_speed,
            azimuth_deg,
            elevation_deg,
            signal_quality: 0.0,
        }
    }

    pub fn with_signal_quality(mut self, signal_quality: f64) -> Self {
        self.signal_quality = signal_quality;
        self
    }

    /// Kinematic measurement vector [range, speed, azimuth, elevation]
    pub fn vector(&self) -> Vector4<f64> {
        Vector4::new(self.range, self.radial_speed, self.azimuth_deg, self.elevation_deg)
    }

    pub fn is_finite(&self) -> bool {
        self.range.is_finite()
            && self.radial_speed.is_finite()
            && self.azimuth_deg.is_finite()
            && self.elevation_deg.is_finite()
            && self.signal_quality.is_finite()
    }
}

/// Reporting form of a track, handed to output collaborators
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackedTarget {
    pub id: u64,
    pub range: f64,
    pub speed: f64,
    pub azimuth: f64,
    pub elevation: f64,
}

/// Lifecycle stage of a track still in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    /// Too young to be reported
    Provisional,
    /// Reported on every tick until removed
    Confirmed,
}

/// Filter model shared by every track: process noise, measurement noise and
/// the covariance a new track starts with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackModel {
    process_noise: ProcessNoise,
    measurement_covariance: Matrix4<f64>,
    initial_covariance: Matrix4<f64>,
}

impl TrackModel {
    pub fn new(
        process_noise: ProcessNoise,
        measurement_noise: &MeasurementNoise,
        initial_uncertainty: &MeasurementNoise,
    ) -> Self {
        TrackModel {
            process_noise,
            measurement_covariance: Matrix4::from_diagonal(&Vector4::from(
                measurement_noise.variances(),
            )),
            initial_covariance: Matrix4::from_diagonal(&Vector4::from(
                initial_uncertainty.variances(),
            )),
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(
            config.process_noise,
            &config.measurement_noise,
            &config.initial_uncertainty,
        )
    }

    /// Transition matrix: range integrates radial speed, everything else is held
    pub fn transition_matrix(dt: f64) -> Matrix4<f64> {
        let mut f = Matrix4::identity();
        f[(0, 1)] = dt;
        f
    }

    /// Transition covariance
    ///
    /// Range/speed use continuous white-noise acceleration; azimuth and
    /// elevation are random walks. Vanishes at dt = 0.
    pub fn transition_covariance(&self, dt: f64) -> Matrix4<f64> {
        let qa = self.process_noise.acceleration.powi(2);
        let mut q = Matrix4::zeros();

        q[(0, 0)] = qa * dt.powi(3) / 3.0;
        q[(0, 1)] = qa * dt.powi(2) / 2.0;
        q[(1, 0)] = q[(0, 1)];
        q[(1, 1)] = qa * dt;
        q[(2, 2)] = self.process_noise.azimuth.powi(2) * dt;
        q[(3, 3)] = self.process_noise.elevation.powi(2) * dt;

        q
    }

    pub fn measurement_covariance(&self) -> &Matrix4<f64> {
        &self.measurement_covariance
    }
}

/// One tracked radar target
#[derive(Debug, Clone)]
pub struct Track {
    id: u64,
    state: Vector4<f64>,
    covariance: Matrix4<f64>,
    model: TrackModel,
    // Advanced only by predict()
    since_creation: Duration,
    since_update: Duration,
    /// Detections accepted since the last tick
    cluster: Vec<Measurement>,
}

impl Track {
    /// Start a track directly from an unassociated detection
    pub fn new(id: u64, measurement: &Measurement, model: TrackModel) -> Self {
        Track {
            id,
            state: measurement.vector(),
            covariance: model.initial_covariance,
            model,
            since_creation: Duration::ZERO,
            since_update: Duration::ZERO,
            cluster: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> &Vector4<f64> {
        &self.state
    }

    pub fn covariance(&self) -> &Matrix4<f64> {
        &self.covariance
    }

    /// Advance state and covariance by `dt` seconds
    ///
    /// x' = F x, P' = F P F^T + Q
    pub fn predict(&mut self, dt: f64) -> Result<(), NumericalError> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(NumericalError::InvalidTimeStep { dt });
        }
        let step =
            Duration::try_from_secs_f64(dt).map_err(|_| NumericalError::InvalidTimeStep { dt })?;

        let f = TrackModel::transition_matrix(dt);
        self.state = f * self.state;
        self.covariance =
            symmetrize(f * self.covariance * f.transpose() + self.model.transition_covariance(dt));

        self.since_creation = self.since_creation.saturating_add(step);
        self.since_update = self.since_update.saturating_add(step);
        Ok(())
    }

    /// Predicted measurement (identity observation)
    pub fn predicted_measurement(&self) -> Vector4<f64> {
        self.state
    }

    /// S = H P H^T + R
    pub fn innovation_covariance(&self) -> Matrix4<f64> {
        self.covariance + self.model.measurement_covariance
    }

    /// S^-1 via Cholesky; fails when S is not symmetric positive definite
    pub fn innovation_covariance_inverse(&self) -> Result<Matrix4<f64>, NumericalError> {
        let singular = NumericalError::SingularInnovation { track_id: self.id };
        let s = self.innovation_covariance();
        if s.iter().any(|v| !v.is_finite()) {
            return Err(singular);
        }

        let inverse = s.cholesky().ok_or_else(|| singular.clone())?.inverse();
        if inverse.iter().all(|v| v.is_finite()) {
            Ok(inverse)
        } else {
            Err(singular)
        }
    }

    /// Squared Mahalanobis distance between a detection and the predicted measurement
    pub fn mahalanobis_squared(&self, measurement: &Measurement) -> Result<f64, NumericalError> {
        let s_inv = self.innovation_covariance_inverse()?;
        let innovation = measurement.vector() - self.predicted_measurement();
        Ok(innovation.dot(&(s_inv * innovation)))
    }

    /// Kalman correction with a detection
    ///
    /// Uses the Joseph form so the covariance stays symmetric positive
    /// semi-definite.
    pub fn update(&mut self, measurement: &Measurement) -> Result<(), NumericalError> {
        let s_inv = self.innovation_covariance_inverse()?;
        let innovation = measurement.vector() - self.predicted_measurement();

        // K = P H^T S^-1 with H = I
        let gain = self.covariance * s_inv;
        self.state += gain * innovation;

        let i_kh = Matrix4::identity() - gain;
        let joseph = i_kh * self.covariance * i_kh.transpose()
            + gain * self.model.measurement_covariance * gain.transpose();
        self.covariance = symmetrize(joseph);

        self.since_update = Duration::ZERO;
        self.cluster.push(*measurement);
        Ok(())
    }

    pub fn time_since_update(&self) -> Duration {
        self.since_update
    }

    pub fn time_since_creation(&self) -> Duration {
        self.since_creation
    }

    /// Confirmed once the track has lived strictly longer than `confirmation_age`
    pub fn status(&self, confirmation_age: Duration) -> TrackStatus {
        if self.since_creation > confirmation_age {
            TrackStatus::Confirmed
        } else {
            TrackStatus::Provisional
        }
    }

    pub fn is_confirmed(&self, confirmation_age: Duration) -> bool {
        self.status(confirmation_age) == TrackStatus::Confirmed
    }

    /// Stale when no detection was accepted for strictly longer than `timeout`
    pub fn is_stale(&self, timeout: Duration) -> bool {
        self.since_update > timeout
    }

    pub fn report(&self) -> TrackedTarget {
        TrackedTarget {
            id: self.id,
            range: self.state[0],
            speed: self.state[1],
            azimuth: self.state[2],
            elevation: self.state[3],
        }
    }

    pub fn cluster(&self) -> &[Measurement] {
        &self.cluster
    }

    /// Hand over the detections accepted since the last tick, leaving the cluster empty
    pub fn take_cluster(&mut self) -> Vec<Measurement> {
        std::mem::take(&mut self.cluster)
    }
}

fn symmetrize(m: Matrix4<f64>) -> Matrix4<f64> {
    (m + m.transpose()) * 0.5
}
