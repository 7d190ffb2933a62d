use mediaflow_core::EngineConfig;
use mediaflow_storage::{SweepReport, UploadSessionStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Periodic staging sweep. Releases the staging of assembled sessions once
/// their grace period has passed and, when an orphan TTL is configured,
/// reaps sessions nobody completed or aborted.
pub struct StagingCleanupService {
    sessions: Arc<UploadSessionStore>,
    sweep_interval: Duration,
    orphan_ttl: Option<Duration>,
}

impl StagingCleanupService {
    pub fn new(sessions: Arc<UploadSessionStore>, config: &EngineConfig) -> Self {
        Self {
            sessions,
            sweep_interval: config.staging_sweep_interval(),
            orphan_ttl: config.staging_orphan_ttl(),
        }
    }

    /// Start the background sweep.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut sweep_interval = interval(self.sweep_interval);

            tracing::info!(
                interval_secs = self.sweep_interval.as_secs(),
                orphan_ttl_secs = self.orphan_ttl.map(|ttl| ttl.as_secs()),
                "Staging cleanup started"
            );

            loop {
                sweep_interval.tick().await;
                self.run_once().await;
            }
        })
    }

    #[tracing::instrument(skip(self), fields(cleanup.operation = "staging_sweep"))]
    pub async fn run_once(&self) -> SweepReport {
        let report = self.sessions.sweep(self.orphan_ttl).await;
        tracing::debug!(
            released = report.released,
            reaped = report.reaped,
            "Staging sweep finished"
        );
        report
    }
}
