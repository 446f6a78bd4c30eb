//! gcwatch agent - JVM memory overflow watchdog
//!
//! Reads GC notifications (newline-delimited JSON) from a file or stdin,
//! keeps an expiring series of post-GC memory readings and periodically
//! reports whether memory is heading toward exhaustion.

use anyhow::{Context, Result};
use gcwatch_agent::{api, config};
use gcwatch_lib::{
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    EventSource, OverflowMonitor, StreamEventSource, WatchConfig, WatchLoop,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting gcwatch-agent");

    let config = config::AgentConfig::load()?;
    info!(
        instance = %config.instance_name,
        input = ?config.input,
        "Agent configured"
    );

    let stream = match &config.input {
        Some(path) => {
            let file = tokio::fs::File::open(path).await.with_context(|| {
                format!("failed to open GC notification input {}", path.display())
            })?;
            Arc::new(StreamEventSource::new(file))
        }
        None => Arc::new(StreamEventSource::new(tokio::io::stdin())),
    };

    let monitor = Arc::new(
        config
            .monitor
            .build(Arc::clone(&stream) as Arc<dyn EventSource>)
            .context("invalid monitor configuration")?,
    );

    let logger = StructuredLogger::new(&config.instance_name);
    logger.log_startup(AGENT_VERSION, monitor.expiry(), monitor.detector());

    let health_registry = HealthRegistry::new();
    health_registry.register(components::EVENT_SOURCE).await;
    health_registry.register(components::DETECTOR).await;

    monitor.start()?;
    health_registry.set_ready(true).await;

    let (shutdown_tx, _) = broadcast::channel(1);

    let watch = WatchLoop::new(
        Arc::clone(&monitor),
        health_registry.clone(),
        logger.clone(),
        WatchConfig {
            interval: config.detect_interval(),
        },
    )
    .with_stream(Arc::clone(&stream));
    let watch_handle = tokio::spawn(watch.run(shutdown_tx.subscribe()));

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        Arc::clone(&monitor),
    ));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            logger.log_shutdown("SIGINT received");
        }
        result = api_handle => {
            match result {
                Ok(Err(e)) => error!(error = %e, "API server failed"),
                Ok(Ok(())) => error!("API server exited unexpectedly"),
                Err(e) => error!(error = %e, "API server task panicked"),
            }
            logger.log_shutdown("API server stopped");
        }
    }

    health_registry.set_ready(false).await;
    monitor.stop();
    // Receivers may already be gone if the loop ended
    let _ = shutdown_tx.send(());
    watch_handle.await?;

    info!("Shutting down");
    Ok(())
}
