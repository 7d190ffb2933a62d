//! Engine, observers and background tasks.

use crate::state::AppState;
use anyhow::{Context, Result};
use mediaflow_core::{Config, MediaRepository, ReadyObserver};
use mediaflow_processing::CommandRunner;
use mediaflow_services::{
    MediaEngine, MediaTagExtractor, MediaTools, MetadataObserver, StagingCleanupService,
};
use mediaflow_storage::LocalMediaStore;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Build the engine with the default metadata observer and start the
/// staging sweep. Fails when ffmpeg or ffprobe cannot be run.
pub async fn initialize_services(
    config: &Config,
    repository: Arc<dyn MediaRepository>,
    runner: Arc<dyn CommandRunner>,
) -> Result<(Arc<AppState>, JoinHandle<()>)> {
    let engine_config = config.engine();
    let tools = MediaTools::new(runner, engine_config)?;
    tools
        .ensure_available()
        .await
        .context("External media tools are not available")?;

    let store = LocalMediaStore::new(engine_config.upload_dir.clone()).await?;
    let observers: Vec<Arc<dyn ReadyObserver>> = vec![Arc::new(MetadataObserver::new(
        repository.clone(),
        Arc::new(MediaTagExtractor::new(tools.clone())),
        store,
    ))];

    let engine = Arc::new(MediaEngine::new(engine_config, repository, tools, observers).await?);

    let cleanup = Arc::new(StagingCleanupService::new(engine.sessions(), engine_config));
    let cleanup_task = cleanup.start();

    tracing::info!("Services initialized");
    Ok((Arc::new(AppState::new(engine, config.clone())), cleanup_task))
}
