//! Synthetic radar sensor
//!
//! Moves point targets at constant radial speed and produces one noisy,
//! shuffled detection batch per frame, with optional missed detections and
//! uniform clutter. Feeds the binary when no real sensor is attached, and
//! the integration tests.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Poisson};

use crate::config::MeasurementNoise;
use crate::track::Measurement;

/// Ground-truth target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimTarget {
    pub range: f64,
    pub speed: f64,
    pub azimuth: f64,
    pub elevation: f64,
}

impl SimTarget {
    pub fn new(range: f64, speed: f64, azimuth: f64, elevation: f64) -> Self {
        SimTarget { range, speed, azimuth, elevation }
    }
}

/// Field of view the simulator draws targets and clutter from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldOfView {
    pub max_range: f64,
    pub max_speed: f64,
    pub azimuth: (f64, f64),
    pub elevation: (f64, f64),
}

impl Default for FieldOfView {
    fn default() -> Self {
        FieldOfView {
            max_range: 80.0,
            max_speed: 3.0,
            azimuth: (-40.0, 40.0),
            elevation: (-5.0, 5.0),
        }
    }
}

pub struct RadarSimulator {
    targets: Vec<SimTarget>,
    fov: FieldOfView,
    noise: [Option<Normal<f64>>; 4],
    detection_probability: f64,
    clutter: Option<Poisson<f64>>,
    rng: StdRng,
}

impl RadarSimulator {
    /// Simulator with `count` targets placed at random inside the default field of view
    pub fn new(count: usize, noise: MeasurementNoise, seed: u64) -> Self {
        let mut sim = Self::with_targets(Vec::new(), noise, seed);
        let fov = sim.fov;
        sim.targets = (0..count)
            .map(|_| SimTarget {
                range: sim.rng.gen_range(5.0..fov.max_range),
                speed: sim.rng.gen_range(-fov.max_speed..fov.max_speed),
                azimuth: sim.rng.gen_range(fov.azimuth.0..fov.azimuth.1),
                elevation: sim.rng.gen_range(fov.elevation.0..fov.elevation.1),
            })
            .collect();
        sim
    }

    /// Simulator with explicit ground truth
    pub fn with_targets(targets: Vec<SimTarget>, noise: MeasurementNoise, seed: u64) -> Self {
        RadarSimulator {
            targets,
            fov: FieldOfView::default(),
            noise: [noise.range, noise.speed, noise.azimuth, noise.elevation]
                .map(|sigma| Normal::new(0.0, sigma).ok()),
            detection_probability: 1.0,
            clutter: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn with_detection_probability(mut self, probability: f64) -> Self {
        self.detection_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Mean number of false detections per frame; <= 0 disables clutter
    pub fn with_clutter_rate(mut self, rate: f64) -> Self {
        self.clutter = if rate > 0.0 { Poisson::new(rate).ok() } else { None };
        self
    }

    pub fn with_field_of_view(mut self, fov: FieldOfView) -> Self {
        self.fov = fov;
        self
    }

    pub fn targets(&self) -> &[SimTarget] {
        &self.targets
    }

    /// Advance ground truth by `dt` seconds and return one detection batch
    pub fn step(&mut self, dt: f64) -> Vec<Measurement> {
        let max_range = self.fov.max_range;
        for target in self.targets.iter_mut() {
            target.range += target.speed * dt;
            // Reflect at the edges of the field of view
            if target.range < 1.0 || target.range > max_range {
                target.speed = -target.speed;
                target.range = target.range.clamp(1.0, max_range);
            }
        }

        let mut batch = Vec::with_capacity(self.targets.len());
        for i in 0..self.targets.len() {
            if self.rng.gen::<f64>() >= self.detection_probability {
                continue;
            }
            let t = self.targets[i];
            let e = self.noise.map(|n| n.map_or(0.0, |n| n.sample(&mut self.rng)));
            let m = Measurement::new(
                (t.range + e[0]).max(0.0),
                t.speed + e[1],
                t.azimuth + e[2],
                t.elevation + e[3],
            )
            .with_signal_quality(self.rng.gen_range(10.0..30.0));
            batch.push(m);
        }

        if let Some(clutter) = self.clutter {
            let count = clutter.sample(&mut self.rng) as usize;
            for _ in 0..count {
                let m = Measurement::new(
                    self.rng.gen_range(0.0..self.fov.max_range),
                    self.rng.gen_range(-self.fov.max_speed..self.fov.max_speed),
                    self.rng.gen_range(self.fov.azimuth.0..self.fov.azimuth.1),
                    self.rng.gen_range(self.fov.elevation.0..self.fov.elevation.1),
                )
                .with_signal_quality(self.rng.gen_range(0.0..10.0));
                batch.push(m);
            }
        }

        // Sensor frames carry no ordering
        batch.shuffle(&mut self.rng);
        batch
    }
}
