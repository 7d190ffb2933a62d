//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use mediaflow_core::{Config, InMemoryMediaRepository, MediaRepository};
use mediaflow_db::PgMediaRepository;
use mediaflow_services::SystemCommandRunner;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct App {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    /// Staging sweep; abort on shutdown.
    pub cleanup_task: JoinHandle<()>,
}

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<App> {
    config
        .validate()
        .context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.json_logs())?;
    tracing::info!("Configuration loaded and validated successfully");

    let repository: Arc<dyn MediaRepository> = match config.database_url() {
        Some(url) => {
            let pool = database::setup_database(url, config.db_max_connections()).await?;
            Arc::new(PgMediaRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, records are kept in memory");
            Arc::new(InMemoryMediaRepository::new())
        }
    };

    let (state, cleanup_task) =
        services::initialize_services(&config, repository, Arc::new(SystemCommandRunner)).await?;
    let router = routes::setup_routes(state.clone());

    Ok(App {
        state,
        router,
        cleanup_task,
    })
}
