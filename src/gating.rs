//! Validation gating and measurement-to-track association
//!
//! Association is greedy and order dependent: tracks are visited in pool
//! order, detections in batch order, and the first track whose gate accepts a
//! detection takes it and is corrected immediately. A claimed detection is
//! invisible to every later track in the same cycle, so nothing is counted
//! twice.
//!
//! This is not a globally optimal assignment and not a nearest-neighbour
//! rule. With crossing or closely spaced targets an older track may take a
//! detection that fits a younger one better. The policy is kept as-is
//! because the older track is usually the better-established one and the cost
//! is linear in `tracks x detections`.

use statrs::distribution::{ChiSquared, ContinuousCDF};
use tracing::{debug, warn};

use crate::constants::MEASUREMENT_DOF;
use crate::error::{ConfigError, NumericalError};
use crate::track::{Measurement, Track};

/// What happened to one detection of the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// No track gated it; it will seed a new track
    Unclaimed,
    /// Consumed by this track
    Claimed { track_id: u64 },
    /// Non-finite fields, dropped before gating
    Rejected,
}

/// Per-cycle association record
#[derive(Debug, Clone, PartialEq)]
pub struct Association {
    /// One entry per detection, in batch order
    pub claims: Vec<Claim>,
    /// Detections accepted by some track
    pub accepted: usize,
    /// Tracks skipped this cycle because their innovation covariance was not invertible
    pub skipped_tracks: usize,
    /// Indices of rejected detections
    pub rejected: Vec<usize>,
}

impl Association {
    /// Indices of valid detections no track accepted
    pub fn unclaimed(&self) -> impl Iterator<Item = usize> + '_ {
        self.claims
            .iter()
            .enumerate()
            .filter(|(_, claim)| **claim == Claim::Unclaimed)
            .map(|(index, _)| index)
    }
}

/// Gate and associate a detection batch against the pool, updating tracks in place.
pub fn associate(tracks: &mut [Track], measurements: &[Measurement], gate_threshold: f64) -> Association {
    let mut claims = vec![Claim::Unclaimed; measurements.len()];
    let mut rejected = Vec::new();

    // A bad detection only takes itself out of the batch
    for (index, measurement) in measurements.iter().enumerate() {
        if !measurement.is_finite() {
            warn!("Dropping detection: {}", NumericalError::NonFiniteMeasurement { index });
            claims[index] = Claim::Rejected;
            rejected.push(index);
        }
    }

    let mut accepted = 0;
    let mut skipped_tracks = 0;

    for track in tracks.iter_mut() {
        for (index, measurement) in measurements.iter().enumerate() {
            if claims[index] != Claim::Unclaimed {
                continue;
            }

            // S changes after every accepted detection, so the gate is re-evaluated each time
            let distance = match track.mahalanobis_squared(measurement) {
                Ok(d) => d,
                Err(e) => {
                    warn!("Track {} not associable this cycle: {}", track.id(), e);
                    skipped_tracks += 1;
                    break;
                }
            };

            debug!("Track {} detection {} d2={:.3}", track.id(), index, distance);

            if distance < gate_threshold {
                if let Err(e) = track.update(measurement) {
                    warn!("Track {} not associable this cycle: {}", track.id(), e);
                    skipped_tracks += 1;
                    break;
                }
                claims[index] = Claim::Claimed { track_id: track.id() };
                accepted += 1;
            }
        }
    }

    Association {
        claims,
        accepted,
        skipped_tracks,
        rejected,
    }
}

/// Gate threshold that passes a true detection with the given probability.
///
/// The squared Mahalanobis distance of a correctly associated detection is
/// chi-square distributed with one degree of freedom per measurement field.
pub fn chi_square_gate(probability: f64) -> Result<f64, ConfigError> {
    if !(probability > 0.0 && probability < 1.0) {
        return Err(ConfigError::InvalidGateProbability(probability));
    }
    let chi = ChiSquared::new(MEASUREMENT_DOF)
        .map_err(|_| ConfigError::InvalidGateProbability(probability))?;
    Ok(chi.inverse_cdf(probability))
}
