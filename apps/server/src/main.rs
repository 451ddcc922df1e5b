mod config;
mod relay;
mod sensor;
mod web;

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use greenhouse_control::{Greenhouse, TickInput};

use crate::config::ServerConfig;
use crate::relay::{RelaySender, ResendTimer};
use crate::sensor::LatestReading;
use crate::web::{create_web_server, WebState};

const DEFAULT_CONFIG_PATH: &str = "/etc/greenhouse/config.json";

fn load_config() -> Result<ServerConfig> {
    match std::env::args().nth(1) {
        Some(path) => ServerConfig::load(path),
        None if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() => {
            ServerConfig::load(DEFAULT_CONFIG_PATH)
        }
        None => {
            tracing::warn!("no config file, using built-in defaults");
            Ok(ServerConfig::default())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    let utc_offset = ChronoDuration::hours(config.greenhouse.location.utc_offset as i64);
    let tick = Duration::from_secs(config.greenhouse.tick_secs);
    let stale_after = Duration::from_secs(config.greenhouse.sensor.stale_after_secs);

    let mut greenhouse =
        Greenhouse::new(config.greenhouse.clone()).context("invalid greenhouse config")?;
    let relays = RelaySender::bind(config.actuators.clone()).await?;
    let latest = LatestReading::default();
    let status = Arc::new(RwLock::new(None));
    let mut resend = ResendTimer::new(config.resend_secs, Instant::now());

    tokio::spawn({
        let latest = latest.clone();
        let bind = config.sensor_bind.clone();
        async move {
            if let Err(e) = sensor::listen(bind, latest).await {
                tracing::error!(error = ?e, "sensor listener stopped");
            }
        }
    });

    tokio::spawn({
        let state = WebState {
            status: status.clone(),
            config: Arc::new(greenhouse.config().clone()),
        };
        let bind = config.web_bind.clone();
        async move {
            if let Err(e) = create_web_server(bind, state).await {
                tracing::error!(error = ?e, "web server stopped");
            }
        }
    });

    tracing::info!(tick_secs = config.greenhouse.tick_secs, "starting control loop");
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let monotonic = Instant::now();
        // Local standard time; daylight saving is never applied.
        let rtc = Some(Utc::now().naive_utc() + utc_offset);
        let output = greenhouse.tick(TickInput {
            rtc,
            monotonic,
            temperature: latest.get(monotonic, stale_after),
        });

        let mut outgoing = output.commands;
        // Commands are edge-triggered; repeat the full state so a lost datagram heals.
        if resend.due(monotonic) {
            outgoing = greenhouse.hold_commands();
            tracing::debug!(count = outgoing.len(), "re-sending actuator state");
        }
        for command in &outgoing {
            if let Err(e) = relays.send(command).await {
                tracing::warn!(error = %e, ?command, "failed to send actuator command");
            }
        }

        if let Ok(mut shared) = status.write() {
            *shared = Some(output.status);
        }
    }
}
