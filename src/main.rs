//! quakewatch binary: wire a configured GeoNet feed to an engine and a
//! scheduler, then log every lifecycle and status event that comes out.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use quakewatch::config;
use quakewatch::{
    ChannelSink, Engine, FeedConfig, FeedMsg, GeonetSource, LifecycleEvent, Scheduler, UnitSystem,
};

/// Watch a quake feed and log entity lifecycle events.
#[derive(Parser, Debug)]
#[command(name = "quakewatch")]
#[command(about = "Polls the GeoNet NZ quake feed and reconciles it into lifecycle events")]
#[command(version)]
struct Args {
    /// Latitude of the home coordinates, in degrees.
    #[arg(long, default_value_t = -41.29)]
    latitude: f64,

    /// Longitude of the home coordinates, in degrees.
    #[arg(long, default_value_t = 174.78)]
    longitude: f64,

    /// Search radius around home (kilometres, or miles with --imperial).
    #[arg(long, default_value_t = config::DEFAULT_RADIUS)]
    radius: f64,

    /// Drop entries below this magnitude.
    #[arg(long, default_value_t = config::DEFAULT_MINIMUM_MAGNITUDE)]
    minimum_magnitude: f64,

    /// Modified Mercalli Intensity threshold requested from the feed (-1..=8).
    #[arg(long, default_value_t = config::DEFAULT_MMI)]
    mmi: i8,

    /// Seconds between polls.
    #[arg(long, default_value_t = 300)]
    interval: u64,

    /// Per-fetch network timeout in seconds.
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Interpret --radius as miles instead of kilometres.
    #[arg(long)]
    imperial: bool,
}

impl Args {
    fn into_config(self) -> FeedConfig {
        let mut config = FeedConfig::new(self.latitude, self.longitude);
        config.radius = self.radius;
        config.minimum_magnitude = self.minimum_magnitude;
        config.mmi = self.mmi;
        config.scan_interval = Duration::from_secs(self.interval);
        config.fetch_timeout = Duration::from_secs(self.timeout);
        config.unit_system = if self.imperial {
            UnitSystem::Imperial
        } else {
            UnitSystem::Metric
        };
        config
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config();
    let interval = config.scan_interval;

    // -- wire the feed instance ----------------------------------------------
    let source = GeonetSource::new(&config);
    let (sink, rx) = ChannelSink::new();
    let engine = Arc::new(
        Engine::new(config, Box::new(source), Box::new(sink))
            .context("invalid feed configuration")?,
    );

    // One immediate refresh so entries exist before the first interval
    // elapses; the scheduler itself never fires eagerly.
    engine.reconcile();
    let _scheduler = Scheduler::start(engine.clone(), interval);
    info!(interval_secs = interval.as_secs(), "quakewatch running");

    // -- consume events ------------------------------------------------------
    // Runs until the process is killed; the scheduler handle above keeps
    // ticking for as long as we are draining.
    for msg in rx {
        match msg {
            FeedMsg::Lifecycle(event) => {
                let id = event.external_id();
                let kind = match &event {
                    LifecycleEvent::Created(_) => "created",
                    LifecycleEvent::Updated(_) => "updated",
                    LifecycleEvent::Removed(_) => "removed",
                };
                match engine.entry(id) {
                    Some(entry) => {
                        info!(
                            external_id = id,
                            kind,
                            locality = %entry.locality,
                            magnitude = entry.magnitude,
                            distance_km = entry.distance_km,
                            "entry changed"
                        );
                    }
                    None => {
                        // Removed entries are gone from the store by the time
                        // the event arrives, so there is no payload to show.
                        info!(external_id = id, kind, "entry changed");
                    }
                }
            }
            FeedMsg::Status(status) => {
                if status.is_success() {
                    info!(
                        total = status.total,
                        created = status.created,
                        updated = status.updated,
                        removed = status.removed,
                        "feed update ok"
                    );
                } else {
                    warn!(
                        error = status.error.as_deref().unwrap_or("unknown"),
                        consecutive_failures = status.consecutive_failures,
                        "feed update failed"
                    );
                }
            }
        }
    }

    Ok(())
}
