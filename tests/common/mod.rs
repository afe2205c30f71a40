//! Shared helpers for the integration tests

#![allow(dead_code)]

use radar_tracker::config::TrackerConfig;
use radar_tracker::simulate::{RadarSimulator, SimTarget};

/// Default configuration with a wide gate so sensor noise never spawns duplicates
pub fn wide_gate_config() -> TrackerConfig {
    TrackerConfig { gate_threshold: 30.0, ..Default::default() }
}

/// Three well separated targets, perfect detection, no clutter
pub fn three_target_simulator(seed: u64) -> RadarSimulator {
    let targets = vec![
        SimTarget::new(20.0, 1.0, -30.0, 0.0),
        SimTarget::new(40.0, -1.5, 0.0, 2.0),
        SimTarget::new(60.0, 0.5, 30.0, -1.0),
    ];
    RadarSimulator::with_targets(targets, TrackerConfig::default().measurement_noise, seed)
        .with_detection_probability(1.0)
}

/// Ground-truth target closest in azimuth
pub fn truth_for(sim: &RadarSimulator, azimuth: f64) -> SimTarget {
    *sim.targets()
        .iter()
        .min_by(|a, b| (a.azimuth - azimuth).abs().total_cmp(&(b.azimuth - azimuth).abs()))
        .expect("simulator has targets")
}
