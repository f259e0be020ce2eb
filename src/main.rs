// main.rs
mod chromaticity;
mod commands;
mod config;
mod devices;
mod error;
mod events;
mod feed;
mod handlers;
mod metrics;
mod models;
mod sequence;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use chromaticity::ChromaticityTable;
use devices::{FixtureGateway, HueBridge, SimulatedFixtures};
use error::AppError;
use events::EventDispatcher;
use feed::FeedClient;
use handlers::AppState;
use sequence::SequenceController;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = config::Settings::new().context("Failed to load config")?;

    if settings.metrics.enabled {
        metrics::setup_metrics(settings.metrics.port).context("Failed to setup metrics")?;
        info!(port = settings.metrics.port, "Metrics exporter listening");
    }

    let wake = &settings.wake_up_sequence;
    let table = ChromaticityTable::load(&wake.chromaticity_table, wake.x_bias, wake.y_bias)
        .context("Failed to load chromaticity table")?;
    let gateway = connect_gateway(&settings)
        .await
        .context("Failed to connect to lights")?;

    let sequence = settings.sequence().context("Invalid wake-up sequence")?;
    let controller = SequenceController::spawn(
        Arc::new(sequence),
        Arc::new(table),
        Arc::clone(&gateway),
    )
    .context("Sequence controller cannot start")?;
    let dispatcher = EventDispatcher::new(controller.sender(), gateway);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    match (&settings.adafruit_io.username, &settings.adafruit_io.key) {
        (Some(username), Some(key)) => {
            let client = FeedClient::new(username, key, &settings.adafruit_io.feed)?;
            client
                .ensure_feed()
                .await
                .context("Failed to open feed")?;
            tasks.push(tokio::spawn(feed::poll(
                client,
                dispatcher.clone(),
                Duration::from_millis(settings.adafruit_io.poll_interval_ms),
                shutdown_rx.clone(),
            )));
            info!(feed = %settings.adafruit_io.feed, "Listening to feed");
        }
        _ => warn!("Adafruit IO credentials missing, feed disabled"),
    }

    if settings.server.enabled {
        let state = Arc::new(AppState {
            dispatcher: dispatcher.clone(),
            status: controller.status(),
        });
        let listener = tokio::net::TcpListener::bind(&settings.server.address)
            .await
            .with_context(|| format!("Failed to bind {}", settings.server.address))?;
        info!("Control server started on {}", settings.server.address);

        let mut shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            let serve = axum::serve(listener, handlers::router(state)).with_graceful_shutdown(
                async move {
                    let _ = shutdown.changed().await;
                },
            );
            if let Err(e) = serve.await {
                tracing::error!(error = %e, "Control server error");
            }
        }));
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down");

    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "Task ended abnormally");
        }
    }
    controller.terminate().await;
    Ok(())
}

async fn connect_gateway(
    settings: &config::Settings,
) -> Result<Arc<dyn FixtureGateway>, AppError> {
    let hue = &settings.hue;
    match &hue.ip_address {
        Some(address) => {
            let bridge = HueBridge::connect(
                address,
                &hue.username,
                Duration::from_millis(hue.request_timeout_ms),
            )
            .await?;
            Ok(Arc::new(bridge))
        }
        None => {
            warn!("No Hue bridge configured, using simulated lights");
            Ok(Arc::new(SimulatedFixtures::new(["1", "2", "3"])))
        }
    }
}
