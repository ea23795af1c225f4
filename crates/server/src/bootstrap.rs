use std::sync::Arc;

use noteit_core::config::{AppConfig, ConfigError, DiscordConfig, LoadOptions, TransportMode};
use noteit_db::{connect_with_config, migrations, DbPool, NoteRepository, SqlNoteRepository};
use noteit_discord::{
    commands::CommandRouter,
    events::default_dispatcher,
    gateway::{GatewayRunner, GatewayTransport, NoopGatewayTransport, ReconnectPolicy},
    rest::DiscordRestMessenger,
    websocket::DiscordGatewayTransport,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub notes: Arc<dyn NoteRepository>,
    pub gateway: GatewayRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Wires the process from an already loaded configuration. Every component
/// is built once here and handed to its consumers.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let notes: Arc<dyn NoteRepository> = Arc::new(SqlNoteRepository::new(db_pool.clone()));
    let router = Arc::new(CommandRouter::new(notes.clone()));
    let gateway = GatewayRunner::new(
        gateway_transport(&config.discord),
        Arc::new(DiscordRestMessenger::from_config(&config.discord)),
        default_dispatcher(router),
        config.discord.token.clone(),
        ReconnectPolicy::default(),
    );

    Ok(Application { config, db_pool, notes, gateway })
}

fn gateway_transport(config: &DiscordConfig) -> Arc<dyn GatewayTransport> {
    match config.transport {
        TransportMode::Gateway => Arc::new(DiscordGatewayTransport::from_config(config)),
        TransportMode::Noop => Arc::new(NoopGatewayTransport),
    }
}
