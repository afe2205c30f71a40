// Radar track pool
// Association, track creation, prediction, pruning and confirmed-track snapshots

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::TrackerConfig;
use crate::error::ConfigError;
use crate::gating;
use crate::track::{Measurement, Track, TrackModel, TrackStatus, TrackedTarget};

/// Outcome of one ingest call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Detections in the batch
    pub received: usize,
    /// Detections accepted by existing tracks
    pub accepted: usize,
    /// Tracks created from unclaimed detections
    pub created: usize,
    /// Detections dropped for non-finite fields
    pub rejected: usize,
    /// Tracks that could not be gated this cycle
    pub skipped_tracks: usize,
}

/// Cumulative counters for status logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    pub batches: u64,
    pub measurements: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub tracks_created: u64,
    pub tracks_pruned: u64,
    pub ticks: u64,
}

/// Polar extent of a detection cluster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterExtent {
    pub min_range: f64,
    pub max_range: f64,
    pub min_azimuth: f64,
    pub max_azimuth: f64,
    pub min_elevation: f64,
    pub max_elevation: f64,
}

impl ClusterExtent {
    pub fn from_measurements(measurements: &[Measurement]) -> Option<Self> {
        let (first, rest) = measurements.split_first()?;
        let mut extent = ClusterExtent {
            min_range: first.range,
            max_range: first.range,
            min_azimuth: first.azimuth_deg,
            max_azimuth: first.azimuth_deg,
            min_elevation: first.elevation_deg,
            max_elevation: first.elevation_deg,
        };
        for m in rest {
            extent.min_range = extent.min_range.min(m.range);
            extent.max_range = extent.max_range.max(m.range);
            extent.min_azimuth = extent.min_azimuth.min(m.azimuth_deg);
            extent.max_azimuth = extent.max_azimuth.max(m.azimuth_deg);
            extent.min_elevation = extent.min_elevation.min(m.elevation_deg);
            extent.max_elevation = extent.max_elevation.max(m.elevation_deg);
        }
        Some(extent)
    }
}

/// Confirmed tracks as of one tick
///
/// `tracks` and `clusters` are parallel: `clusters[i]` holds the detections
/// `tracks[i]` accepted since the previous tick. Both follow pool order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub tracks: Vec<TrackedTarget>,
    pub clusters: Vec<Vec<Measurement>>,
    /// Pool size (confirmed and provisional) after pruning
    pub pool_size: usize,
}

impl TrackSnapshot {
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TrackedTarget, &[Measurement])> {
        self.tracks
            .iter()
            .zip(self.clusters.iter().map(Vec::as_slice))
    }

    pub fn get(&self, id: u64) -> Option<&TrackedTarget> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn cluster_extent(&self, index: usize) -> Option<ClusterExtent> {
        self.clusters
            .get(index)
            .and_then(|c| ClusterExtent::from_measurements(c))
    }
}

/// Radar track pool - owns every track and applies detections and ticks to it
///
/// Not synchronized; `Coordinator` wraps it in the pool lock.
pub struct Tracker {
    tracks: Vec<Track>,
    config: TrackerConfig,
    model: TrackModel,
    /// Next id to hand out; ids are never reused
    next_track_id: u64,
    stats: TrackerStats,
}

impl Tracker {
    /// Create an empty pool from a configuration, validating it first
    pub fn new(config: TrackerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Tracker {
            tracks: Vec::with_capacity(config.initial_pool_capacity_hint),
            model: TrackModel::from_config(&config),
            config,
            next_track_id: 1,
            stats: TrackerStats::default(),
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Apply a detection batch
    ///
    /// Detections are gated against the tracks' current predictions (no
    /// prediction happens here); every valid detection that no track accepts
    /// starts a new provisional track.
    pub fn ingest(&mut self, measurements: &[Measurement]) -> IngestSummary {
        let association =
            gating::associate(&mut self.tracks, measurements, self.config.gate_threshold);

        let mut created = 0;
        for index in association.unclaimed() {
            let id = self.next_track_id;
            self.next_track_id += 1;
            self.tracks.push(Track::new(id, &measurements[index], self.model));
            debug!("New track {} from detection {}: {:?}", id, index, measurements[index]);
            created += 1;
        }

        let summary = IngestSummary {
            received: measurements.len(),
            accepted: association.accepted,
            created,
            rejected: association.rejected.len(),
            skipped_tracks: association.skipped_tracks,
        };

        self.stats.batches += 1;
        self.stats.measurements += summary.received as u64;
        self.stats.accepted += summary.accepted as u64;
        self.stats.rejected += summary.rejected as u64;
        self.stats.tracks_created += summary.created as u64;

        summary
    }

    /// Advance the pool by `dt` seconds
    ///
    /// Predicts every track, drops tracks that went stale, and returns the
    /// confirmed tracks with the detections each accepted since the last tick.
    /// Clusters of all tracks are cleared afterwards.
    pub fn tick(&mut self, dt: f64) -> TrackSnapshot {
        self.stats.ticks += 1;

        for track in self.tracks.iter_mut() {
            // dt is shared, so one failure means the whole prediction step is invalid
            if let Err(e) = track.predict(dt) {
                warn!("Skipping prediction this tick: {}", e);
                break;
            }
        }

        let before = self.tracks.len();
        let timeout = self.config.staleness_timeout;
        self.tracks.retain(|track| {
            let stale = track.is_stale(timeout);
            if stale {
                debug!(
                    "Dropping track {} ({:?} since last update)",
                    track.id(),
                    track.time_since_update()
                );
            }
            !stale
        });
        let pruned = before - self.tracks.len();
        self.stats.tracks_pruned += pruned as u64;
        if pruned > 0 {
            debug!("Pruned {} tracks: pool {} -> {}", pruned, before, self.tracks.len());
        }

        let confirmation_age = self.config.confirmation_age;
        let mut snapshot = TrackSnapshot {
            tracks: Vec::new(),
            clusters: Vec::new(),
            pool_size: self.tracks.len(),
        };
        for track in self.tracks.iter_mut() {
            let cluster = track.take_cluster();
            if track.is_confirmed(confirmation_age) {
                snapshot.tracks.push(track.report());
                snapshot.clusters.push(cluster);
            }
        }

        snapshot
    }

    /// Number of tracks old enough to be reported
    pub fn confirmed_count(&self) -> usize {
        let age = self.config.confirmation_age;
        self.tracks.iter().filter(|t| t.is_confirmed(age)).count()
    }

    /// Number of tracks in the pool, confirmed or not
    pub fn pool_size(&self) -> usize {
        self.tracks.len()
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    /// Copy of every track in the pool, in pool order
    pub fn tracks(&self) -> Vec<TrackedTarget> {
        self.tracks.iter().map(Track::report).collect()
    }

    /// Copy of a single track
    pub fn track(&self, id: u64) -> Option<Track> {
        self.tracks.iter().find(|t| t.id() == id).cloned()
    }

    pub fn status(&self, id: u64) -> Option<TrackStatus> {
        self.tracks
            .iter()
            .find(|t| t.id() == id)
            .map(|t| t.status(self.config.confirmation_age))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tracker() -> Tracker {
        Tracker::new(TrackerConfig::default()).unwrap()
    }

    /// Tick in 0.2 s steps until the single track at id is confirmed
    fn confirm(tracker: &mut Tracker, id: u64) {
        while tracker.status(id) != Some(TrackStatus::Confirmed) {
            tracker.tick(0.2);
        }
    }

    #[test]
    fn test_tracker_creation() {
        let tracker = tracker();
        assert_eq!(tracker.pool_size(), 0);
        assert_eq!(tracker.confirmed_count(), 0);
        assert_eq!(tracker.stats(), TrackerStats::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TrackerConfig { gate_threshold: -1.0, ..Default::default() };
        assert!(matches!(Tracker::new(config), Err(ConfigError::NonPositiveGate(_))));
    }

    #[test]
    fn test_single_detection_creates_provisional_track() {
        let mut tracker = tracker();
        let m = Measurement::new(10.0, 0.0, 0.0, 0.0);

        let summary = tracker.ingest(&[m]);

        assert_eq!(summary.created, 1);
        assert_eq!(tracker.pool_size(), 1);
        assert_eq!(tracker.confirmed_count(), 0);
        assert_eq!(tracker.status(1), Some(TrackStatus::Provisional));
        let track = tracker.track(1).unwrap();
        assert!((track.state() - m.vector()).norm() < 1e-12);
    }

    #[test]
    fn test_gated_detection_updates_in_place() {
        let mut tracker = tracker();
        tracker.ingest(&[Measurement::new(10.0, 0.0, 0.0, 0.0)]);
        confirm(&mut tracker, 1);
        let before = tracker.track(1).unwrap();

        let summary = tracker.ingest(&[Measurement::new(10.05, 0.1, 0.2, 0.0)]);

        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.created, 0);
        assert_eq!(tracker.pool_size(), 1);
        let after = tracker.track(1).unwrap();
        assert_eq!(after.time_since_update(), Duration::ZERO);
        assert_ne!(after.state(), before.state());
        assert_eq!(tracker.status(1), Some(TrackStatus::Confirmed));
    }

    #[test]
    fn test_far_detection_spawns_second_track() {
        let mut tracker = tracker();
        tracker.ingest(&[Measurement::new(10.0, 0.0, 0.0, 0.0)]);
        confirm(&mut tracker, 1);
        let before = tracker.track(1).unwrap();

        let summary = tracker.ingest(&[Measurement::new(200.0, 0.0, 0.0, 0.0)]);

        assert_eq!(summary.accepted, 0);
        assert_eq!(summary.created, 1);
        assert_eq!(tracker.pool_size(), 2);
        let after = tracker.track(1).unwrap();
        assert_eq!(after.state(), before.state());
        assert_eq!(after.covariance(), before.covariance());
        assert_eq!(tracker.status(2), Some(TrackStatus::Provisional));
    }

    #[test]
    fn test_stale_confirmed_track_pruned() {
        let mut tracker = tracker();
        tracker.ingest(&[Measurement::new(10.0, 0.0, 0.0, 0.0)]);
        confirm(&mut tracker, 1);

        // 1.0 s timeout: still present at 1.0, gone once past it
        let mut elapsed = tracker.track(1).unwrap().time_since_update().as_secs_f64();
        while elapsed + 0.25 <= 1.0 {
            tracker.tick(0.25);
            elapsed += 0.25;
            assert_eq!(tracker.pool_size(), 1);
        }
        let snapshot = tracker.tick(0.3);
        assert_eq!(tracker.pool_size(), 0);
        assert!(snapshot.is_empty());
        assert_eq!(tracker.stats().tracks_pruned, 1);
    }

    #[test]
    fn test_track_at_timeout_survives_default_rate() {
        let mut tracker = tracker();
        tracker.ingest(&[Measurement::new(10.0, 0.0, 0.0, 0.0)]);
        let timeout = tracker.config().staleness_timeout;
        let dt = tracker.config().tick_period().as_secs_f64();

        for _ in 0..20 {
            tracker.tick(dt);
        }
        assert_eq!(tracker.track(1).unwrap().time_since_update(), timeout);
        assert_eq!(tracker.pool_size(), 1);

        tracker.tick(dt);
        assert_eq!(tracker.pool_size(), 0);
        assert_eq!(tracker.stats().tracks_pruned, 1);
    }

    #[test]
    fn test_pruning_removes_exactly_stale_tracks() {
        let mut tracker = tracker();
        tracker.ingest(&[
            Measurement::new(10.0, 0.0, 0.0, 0.0),
            Measurement::new(50.0, 0.0, 30.0, 0.0),
            Measurement::new(90.0, 0.0, -30.0, 0.0),
        ]);
        tracker.tick(0.6);
        // Only the middle target is refreshed
        tracker.ingest(&[Measurement::new(50.0, 0.0, 30.0, 0.0)]);

        let stale_before: Vec<u64> = (1..=3)
            .filter(|&id| {
                let t = tracker.track(id).unwrap();
                t.time_since_update().as_secs_f64() + 0.6 > 1.0
            })
            .collect();
        assert_eq!(stale_before, vec![1, 3]);

        tracker.tick(0.6);

        assert_eq!(tracker.pool_size(), 1);
        assert!(tracker.track(2).is_some());
        assert!(tracker.track(1).is_none());
        assert!(tracker.track(3).is_none());
    }

    #[test]
    fn test_new_identity_after_removal() {
        let mut tracker = tracker();
        let m = Measurement::new(10.0, 0.0, 0.0, 0.0);
        tracker.ingest(&[m]);
        tracker.tick(1.5);
        assert_eq!(tracker.pool_size(), 0);

        tracker.ingest(&[m]);
        assert!(tracker.track(1).is_none());
        assert!(tracker.track(2).is_some());
    }

    #[test]
    fn test_unique_ids_per_unclaimed_detection() {
        let mut tracker = tracker();
        let batch: Vec<Measurement> = (0..4)
            .map(|i| Measurement::new(20.0 * (i + 1) as f64, 0.0, 0.0, 0.0))
            .collect();
        let summary = tracker.ingest(&batch);
        assert_eq!(summary.created, 4);

        let summary = tracker.ingest(&[Measurement::new(500.0, 0.0, 0.0, 0.0)]);
        assert_eq!(summary.created, 1);

        let ids: Vec<u64> = tracker.tracks().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_zero_tick_is_idempotent() {
        let mut tracker = tracker();
        tracker.ingest(&[
            Measurement::new(10.0, 1.0, 0.0, 0.0),
            Measurement::new(40.0, -2.0, 20.0, 5.0),
        ]);
        tracker.tick(0.3);
        let tracks = tracker.tracks();

        for _ in 0..20 {
            tracker.tick(0.0);
        }

        assert_eq!(tracker.tracks(), tracks);
        assert_eq!(tracker.pool_size(), 2);
    }

    #[test]
    fn test_invalid_tick_still_prunes_and_reports() {
        let mut tracker = tracker();
        tracker.ingest(&[Measurement::new(10.0, 0.0, 0.0, 0.0)]);
        tracker.tick(0.7);
        let tracks = tracker.tracks();

        let snapshot = tracker.tick(f64::NAN);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(tracker.tracks(), tracks);

        let snapshot = tracker.tick(-1.0);
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_snapshot_clusters() {
        let mut tracker = tracker();
        tracker.ingest(&[
            Measurement::new(10.0, 0.0, 0.0, 0.0),
            Measurement::new(60.0, 0.0, 25.0, 0.0),
        ]);
        tracker.tick(0.6);

        let near = [
            Measurement::new(10.02, 0.0, 0.1, 0.0),
            Measurement::new(9.98, 0.0, -0.1, 0.0),
        ];
        tracker.ingest(&near);

        let snapshot = tracker.tick(0.0);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.clusters.len(), 2);
        assert_eq!(snapshot.pool_size, 2);

        let (first, cluster) = snapshot.iter().next().unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(cluster, &near[..]);
        assert!(snapshot.clusters[1].is_empty());

        let extent = snapshot.cluster_extent(0).unwrap();
        assert_eq!(extent.min_range, 9.98);
        assert_eq!(extent.max_range, 10.02);
        assert_eq!(extent.min_azimuth, -0.1);
        assert!(snapshot.cluster_extent(1).is_none());

        // Clusters are per tick
        let snapshot = tracker.tick(0.0);
        assert!(snapshot.clusters.iter().all(Vec::is_empty));
    }

    #[test]
    fn test_pool_size_bounds_confirmed_count() {
        let mut tracker = tracker();
        for step in 0..20 {
            let offset = step as f64;
            tracker.ingest(&[
                Measurement::new(10.0 + offset * 10.0, 0.0, 0.0, 0.0),
                Measurement::new(30.0, 0.0, 40.0, 0.0),
            ]);
            let snapshot = tracker.tick(0.1);
            assert!(tracker.pool_size() >= tracker.confirmed_count());
            assert_eq!(snapshot.len(), tracker.confirmed_count());
            assert_eq!(snapshot.pool_size, tracker.pool_size());
        }
    }

    #[test]
    fn test_capacity_hint_is_not_a_limit() {
        let config = TrackerConfig { initial_pool_capacity_hint: 2, ..Default::default() };
        let mut tracker = Tracker::new(config).unwrap();
        let batch: Vec<Measurement> = (0..10)
            .map(|i| Measurement::new(25.0 * i as f64, 0.0, 0.0, 0.0))
            .collect();
        tracker.ingest(&batch);
        assert_eq!(tracker.pool_size(), 10);
    }

    #[test]
    fn test_bad_detection_does_not_abort_batch() {
        let mut tracker = tracker();
        let summary = tracker.ingest(&[
            Measurement::new(10.0, 0.0, 0.0, 0.0),
            Measurement::new(f64::NAN, 0.0, 0.0, 0.0),
            Measurement::new(80.0, 0.0, 0.0, 0.0),
        ]);

        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.created, 2);
        assert_eq!(tracker.stats().rejected, 1);
    }

    #[test]
    fn test_ages_between_updates() {
        let mut tracker = tracker();
        tracker.ingest(&[Measurement::new(10.0, 0.0, 0.0, 0.0)]);

        let mut last = Duration::ZERO;
        for _ in 0..3 {
            tracker.tick(0.1);
            let age = tracker.track(1).unwrap().time_since_update();
            assert!(age >= last);
            last = age;
        }

        tracker.ingest(&[Measurement::new(10.0, 0.0, 0.0, 0.0)]);
        let track = tracker.track(1).unwrap();
        assert_eq!(track.time_since_update(), Duration::ZERO);
        assert!(track.time_since_creation() >= last);
    }
}
