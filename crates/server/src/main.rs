mod bootstrap;
mod health;

use anyhow::Result;
use noteit_core::config::{AppConfig, LoadOptions};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use noteit_core::config::LogFormat::*;

    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        database_url = %app.config.database.url,
        "noteit-server started"
    );

    let transport_mode = app.gateway.transport_mode().as_str();
    tracing::info!(
        event_name = "system.server.gateway_transport_mode",
        transport_mode,
        correlation_id = "bootstrap",
        "gateway transport mode initialized"
    );
    if app.gateway.is_noop_transport() {
        tracing::warn!(
            event_name = "system.server.gateway_transport_noop",
            transport_mode,
            correlation_id = "bootstrap",
            "noop gateway transport configured; chat messages will not be received"
        );
    }

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);
    let signalled = tokio::select! {
        result = app.gateway.start() => {
            result?;
            false
        }
        result = &mut shutdown => {
            result?;
            true
        }
    };
    if !signalled {
        tracing::info!(
            event_name = "system.server.gateway_stopped",
            correlation_id = "gateway",
            "gateway stopped; waiting for shutdown signal"
        );
        shutdown.await?;
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "noteit-server stopping"
    );
    app.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
