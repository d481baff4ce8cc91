//! Artie Sensor Daemon
//!
//! Registers sensor processes, configures and starts them at boot, polls
//! them for data and stops them on shutdown. Exposes a small JSON control API.

mod api;
mod config;
mod controller;
mod events;
mod poller;
mod ports;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use artie_sensor_core::{FileRegistry, HttpSensorLink};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use api::ApiState;
use config::Config;
use controller::{ControllerSettings, SensorController};
use events::EventPublisher;
use poller::Poller;

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.toml".to_string());

    let config = Config::load(&config_path).context("Failed to load configuration")?;
    info!("Loaded configuration from: {}", config_path);

    // Open the sensor registry
    let registry_path = config.registry_path();
    let registry = FileRegistry::open(&registry_path)
        .with_context(|| format!("Failed to open registry {}", registry_path.display()))?;
    info!("Using sensor registry: {}", registry_path.display());

    let link = HttpSensorLink::new(&config.sensors.host, config.sensors.request_timeout())
        .context("Failed to create sensor HTTP client")?;

    // Lifecycle events go to the log
    let (events, events_rx) = EventPublisher::channel(config.events.capacity);
    tokio::spawn(events::log_events(events_rx));

    let controller = Arc::new(SensorController::new(
        Box::new(registry),
        Arc::new(link),
        events,
        ControllerSettings::from_config(&config),
    ));

    // Bring the registered sensors up in the background
    let run_controller = controller.clone();
    let run_task = tokio::spawn(async move {
        let outcomes = run_controller.run().await;
        for outcome in outcomes.iter().filter(|o| !o.is_ok()) {
            if let Err(e) = &outcome.result {
                warn!("Sensor {} not running: {}", outcome.sensor_name, e);
            }
        }
    });

    // Start poll loop
    let poll_task = tokio::spawn(
        Poller::new(controller.clone(), config.sensors.poll_interval()).run(),
    );

    // Setup Unix signal handlers
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    let app = api::create_router(Arc::new(ApiState {
        controller: controller.clone(),
        shutdown_tx,
    }));
    let addr: SocketAddr = config
        .listen
        .parse()
        .context("Invalid listen address")?;
    let listener = TcpListener::bind(addr).await?;
    info!("Control API listening on http://{}", addr);

    // Run server until a shutdown is requested
    let served: Result<()> = tokio::select! {
        result = axum::serve(listener, app) => {
            result.context("Control API server failed")
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown requested via API");
            Ok(())
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
            Ok(())
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down");
            Ok(())
        }
    };

    teardown(&controller, &[run_task, poll_task], served).await
}

/// Stops the background tasks and the sensor fleet, whatever ended the
/// server, then hands back how the server ended.
async fn teardown(
    controller: &SensorController,
    tasks: &[JoinHandle<()>],
    served: Result<()>,
) -> Result<()> {
    if let Err(e) = &served {
        error!("{:#}", e);
    }
    for task in tasks {
        task.abort();
    }
    if controller.destroy().await.is_none() {
        warn!("Not every sensor confirmed shutdown");
    }
    served
}
