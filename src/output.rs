use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::tracker::TrackSnapshot;

/// Trait for output handlers
pub trait OutputHandler: Send + Sync {
    /// Handle the confirmed-track snapshot of one tick
    fn handle_snapshot(&mut self, snapshot: &TrackSnapshot);
}

/// Logs every confirmed track through `tracing`
#[derive(Debug, Default)]
pub struct LogOutput {
    /// Ticks between log lines; 1 logs every tick
    every: u64,
    ticks: u64,
}

impl LogOutput {
    pub fn new(every: u64) -> Self {
        LogOutput { every: every.max(1), ticks: 0 }
    }
}

impl OutputHandler for LogOutput {
    fn handle_snapshot(&mut self, snapshot: &TrackSnapshot) {
        self.ticks += 1;
        if self.ticks % self.every.max(1) != 0 {
            return;
        }

        for (target, cluster) in snapshot.iter() {
            info!(
                "Track {}: range {:.2} m, speed {:.2} m/s, az {:.1} deg, el {:.1} deg ({} detections)",
                target.id,
                target.range,
                target.speed,
                target.azimuth,
                target.elevation,
                cluster.len()
            );
        }
        if tracing::enabled!(tracing::Level::DEBUG) {
            match serde_json::to_string(snapshot) {
                Ok(json) => debug!("Snapshot: {}", json),
                Err(e) => debug!("Snapshot not serializable: {}", e),
            }
        }
    }
}

/// Forwards snapshots to any number of subscribers
pub struct BroadcastOutput {
    tx: broadcast::Sender<Arc<TrackSnapshot>>,
}

impl BroadcastOutput {
    /// Create the output and a first subscriber
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<Arc<TrackSnapshot>>) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        (BroadcastOutput { tx }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<TrackSnapshot>> {
        self.tx.subscribe()
    }
}

impl OutputHandler for BroadcastOutput {
    fn handle_snapshot(&mut self, snapshot: &TrackSnapshot) {
        // No subscribers is not an error; lagging ones skip ahead on their own
        let _ = self.tx.send(Arc::new(snapshot.clone()));
    }
}
