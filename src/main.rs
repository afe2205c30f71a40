// Radar tracker - Main Entry Point
// Licensed under AGPL v3

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use radar_tracker::config::Config;
use radar_tracker::coordinator::Coordinator;
use radar_tracker::output::LogOutput;
use radar_tracker::scheduler::Scheduler;
use radar_tracker::simulate::RadarSimulator;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    init_logging(config.verbose);

    info!("Starting radar tracker");

    let tracker_config = match config.tracker_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };
    info!(
        "Gate {:.3}, confirm after {:?}, drop after {:?}, {} Hz",
        tracker_config.gate_threshold,
        tracker_config.confirmation_age,
        tracker_config.staleness_timeout,
        tracker_config.tick_frequency_hz
    );

    let coordinator = Arc::new(Coordinator::new(tracker_config)?);

    // Roughly one track report per second
    let log_every = config.tick_frequency.round().max(1.0) as u64;
    coordinator.add_output(Box::new(LogOutput::new(log_every))).await;

    let scheduler = Scheduler::start(coordinator.clone(), config.status_interval);

    // Detection path: sensor task -> channel -> ingest task
    let (tx, rx) = mpsc::channel(64);
    let ingest = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.ingest_from(rx).await })
    };

    let seed = config.seed.unwrap_or_else(rand::random);
    info!(
        "Simulating {} targets at {} Hz (seed {}, clutter {}/frame)",
        config.sim_targets, config.sensor_rate, seed, config.clutter_rate
    );
    let mut sim = RadarSimulator::new(config.sim_targets, config.measurement_noise(), seed)
        .with_detection_probability(0.9)
        .with_clutter_rate(config.clutter_rate);
    let sensor_period = match Duration::try_from_secs_f64(1.0 / config.sensor_rate) {
        Ok(p) if !p.is_zero() => p,
        _ => {
            warn!("Sensor rate {} invalid, using 10 Hz", config.sensor_rate);
            Duration::from_millis(100)
        }
    };
    let sensor = tokio::spawn(async move {
        let mut frames = tokio::time::interval(sensor_period);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            frames.tick().await;
            let batch = sim.step(sensor_period.as_secs_f64());
            if tx.send(batch).await.is_err() {
                break;
            }
        }
    });

    info!("Tracker ready");

    let run_for = config
        .duration
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .filter(|d| !d.is_zero());
    tokio::select! {
        res = signal::ctrl_c() => match res {
            Ok(()) => info!("Received shutdown signal (Ctrl+C)"),
            Err(err) => {
                error!("Unable to listen for shutdown signal: {}", err);
                return Err(err.into());
            }
        },
        _ = async {
            match run_for {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        } => info!("Run duration elapsed"),
    }

    info!("Shutting down...");
    sensor.abort();
    let _ = sensor.await;
    // Sender dropped with the sensor task; ingest drains what is queued and exits
    if let Err(e) = ingest.await {
        error!("Ingest task failed: {}", e);
    }
    scheduler.shutdown().await;

    coordinator.log_status().await;
    info!("Tracker stopped with {} confirmed tracks", coordinator.confirmed_count().await);

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_span_events(if verbose {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    if verbose {
        subscriber.with_max_level(tracing::Level::DEBUG).init();
        info!("Verbose logging enabled (DEBUG level)");
    } else {
        subscriber.with_max_level(tracing::Level::INFO).init();
    }
}
