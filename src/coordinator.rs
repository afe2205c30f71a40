// Coordinator - shared track pool plus output fan-out
// Ingestion and the periodic tick both go through here and serialize on the pool lock.

use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::error::ConfigError;
use crate::output::OutputHandler;
use crate::track::{Measurement, TrackedTarget};
use crate::tracker::{IngestSummary, TrackSnapshot, Tracker, TrackerStats};

/// Thread-safe track manager
///
/// The whole pool sits behind a single exclusive lock held for the full
/// duration of every ingest and tick, so the two never interleave and a
/// published snapshot is always one consistent tick.
pub struct Coordinator {
    tracker: Mutex<Tracker>,
    outputs: RwLock<Vec<Box<dyn OutputHandler>>>,
    config: TrackerConfig,
}

impl Coordinator {
    /// Create a coordinator; fails on an invalid configuration
    pub fn new(config: TrackerConfig) -> Result<Self, ConfigError> {
        let tracker = Tracker::new(config.clone())?;
        Ok(Coordinator {
            tracker: Mutex::new(tracker),
            outputs: RwLock::new(Vec::new()),
            config,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Add an output handler
    pub async fn add_output(&self, output: Box<dyn OutputHandler>) {
        self.outputs.write().await.push(output);
    }

    /// Apply one detection batch under the pool lock
    pub async fn ingest(&self, batch: &[Measurement]) -> IngestSummary {
        let summary = {
            let mut tracker = self.tracker.lock().await;
            tracker.ingest(batch)
        };
        if summary.rejected > 0 || summary.skipped_tracks > 0 {
            warn!(
                "Batch of {}: {} detections rejected, {} tracks not associable",
                summary.received, summary.rejected, summary.skipped_tracks
            );
        }
        debug!("Ingest: {:?}", summary);
        summary
    }

    /// Predict, prune and snapshot under the pool lock
    pub async fn tick(&self, dt: f64) -> TrackSnapshot {
        let mut tracker = self.tracker.lock().await;
        tracker.tick(dt)
    }

    /// Hand a snapshot to every output. Called with the pool lock released.
    pub async fn publish(&self, snapshot: &TrackSnapshot) {
        let mut outputs = self.outputs.write().await;
        for output in outputs.iter_mut() {
            output.handle_snapshot(snapshot);
        }
    }

    /// Consume detection batches until every sender is dropped
    pub async fn ingest_from(&self, mut batches: mpsc::Receiver<Vec<Measurement>>) {
        while let Some(batch) = batches.recv().await {
            self.ingest(&batch).await;
        }
        debug!("Detection channel closed");
    }

    pub async fn confirmed_count(&self) -> usize {
        self.tracker.lock().await.confirmed_count()
    }

    pub async fn pool_size(&self) -> usize {
        self.tracker.lock().await.pool_size()
    }

    pub async fn stats(&self) -> TrackerStats {
        self.tracker.lock().await.stats()
    }

    /// Copy of every track in the pool
    pub async fn tracks(&self) -> Vec<TrackedTarget> {
        self.tracker.lock().await.tracks()
    }

    /// Log a one-line status summary
    pub async fn log_status(&self) {
        let (pool, confirmed, stats) = {
            let tracker = self.tracker.lock().await;
            (tracker.pool_size(), tracker.confirmed_count(), tracker.stats())
        };
        info!(
            "Status: ({} tracks {} confirmed) ({} batches {} detections {} rejected) ({} created {} pruned)",
            pool,
            confirmed,
            stats.batches,
            stats.measurements,
            stats.rejected,
            stats.tracks_created,
            stats.tracks_pruned
        );
    }
}
