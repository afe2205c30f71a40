// Periodic predict/publish loop
// Runs at the configured tick frequency, independent of how fast detections arrive.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::coordinator::Coordinator;

/// Handle to the running tick loop
pub struct Scheduler {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    /// Spawn the tick loop for a coordinator.
    ///
    /// `status_interval` is in seconds; <= 0 disables status logging.
    pub fn start(coordinator: Arc<Coordinator>, status_interval: i32) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(run(coordinator, status_interval, shutdown_rx));
        Scheduler { shutdown_tx, handle }
    }

    /// Stop the loop and wait for it to exit. A tick in progress completes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.handle.await {
            error!("Scheduler task failed: {}", e);
        }
    }
}

async fn run(coordinator: Arc<Coordinator>, status_interval: i32, mut shutdown_rx: mpsc::Receiver<()>) {
    let period = coordinator.config().tick_period();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let status_period = (status_interval > 0).then(|| Duration::from_secs(status_interval as u64));
    let mut next_status = status_period.map(|p| Instant::now() + p);

    info!("Scheduler running every {:?}", period);

    let mut previous: Option<Instant> = None;
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                // Measured elapsed time, not the nominal period; first tick predicts nothing
                let now = Instant::now();
                let dt = previous.map_or(0.0, |p| now.duration_since(p).as_secs_f64());
                previous = Some(now);

                let snapshot = coordinator.tick(dt).await;
                debug!("Tick dt={:.4}s: {} confirmed of {}", dt, snapshot.len(), snapshot.pool_size);
                coordinator.publish(&snapshot).await;

                if let (Some(next), Some(p)) = (next_status.as_mut(), status_period) {
                    if now >= *next {
                        *next += p;
                        coordinator.log_status().await;
                    }
                }
            }
        }
    }

    info!("Scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::output::BroadcastOutput;
    use crate::track::Measurement;
    use crate::tracker::TrackSnapshot;
    use tokio::sync::broadcast;

    fn drain(rx: &mut broadcast::Receiver<Arc<TrackSnapshot>>) -> Vec<Arc<TrackSnapshot>> {
        let mut received = Vec::new();
        while let Ok(snapshot) = rx.try_recv() {
            received.push(snapshot);
        }
        received
    }

    async fn setup() -> (Arc<Coordinator>, broadcast::Receiver<Arc<TrackSnapshot>>) {
        let coordinator = Arc::new(Coordinator::new(TrackerConfig::default()).unwrap());
        let (output, rx) = BroadcastOutput::new(256);
        coordinator.add_output(Box::new(output)).await;
        (coordinator, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_publishes_each_tick() {
        let (coordinator, mut rx) = setup().await;
        let scheduler = Scheduler::start(coordinator.clone(), -1);

        // 20 Hz: ticks at 0, 50, ..., 500 ms
        tokio::time::sleep(Duration::from_millis(520)).await;
        let received = drain(&mut rx);
        assert!(received.len() >= 10, "got {} snapshots", received.len());

        scheduler.shutdown().await;
        assert_eq!(coordinator.stats().await.ticks as usize, received.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_confirms_then_prunes() {
        let (coordinator, mut rx) = setup().await;
        coordinator.ingest(&[Measurement::new(10.0, 0.0, 0.0, 0.0)]).await;
        let scheduler = Scheduler::start(coordinator.clone(), -1);

        // Past the 0.5 s confirmation age, inside the 1.0 s timeout
        tokio::time::sleep(Duration::from_millis(720)).await;
        let last = drain(&mut rx).pop().unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last.tracks[0].id, 1);

        // Past the timeout with no detections
        tokio::time::sleep(Duration::from_millis(500)).await;
        let last = drain(&mut rx).pop().unwrap();
        assert!(last.is_empty());
        assert_eq!(last.pool_size, 0);
        assert_eq!(coordinator.pool_size().await, 0);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_ticking() {
        let (coordinator, _rx) = setup().await;
        let scheduler = Scheduler::start(coordinator.clone(), 1);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        scheduler.shutdown().await;
        let ticks = coordinator.stats().await.ticks;
        assert!(ticks > 0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(coordinator.stats().await.ticks, ticks);
    }
}
