use gigbook_core::config::{AppConfig, ConfigError, LoadOptions};
use gigbook_core::errors::ApplicationError;
use gigbook_db::{connect_configured, migrations, DbPool};
use thiserror::Error;
use tracing::info;

use crate::context::EngineContext;
use crate::notify::build_event_sink;
use crate::Engine;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub engine: Engine,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("event delivery could not be configured: {0}")]
    Notifications(#[source] ApplicationError),
}

/// Loads configuration, opens and migrates the database, and wires every
/// service to SQL storage and the configured event sink.
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Same as [`bootstrap`] for a caller that already loaded the configuration,
/// typically to initialize logging from it first.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let db_pool =
        connect_configured(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
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

    let events = build_event_sink(&config.notifications).map_err(BootstrapError::Notifications)?;
    let engine = Engine::new(EngineContext::sql(db_pool.clone(), events))
        .with_collaborator_limit(config.engagement.frequent_collaborator_limit);
    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        notifications = config.notifications.enabled,
        "engagement engine ready"
    );

    Ok(Application { config, db_pool, engine })
}
