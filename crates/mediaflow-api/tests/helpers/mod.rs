//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p mediaflow-api`. Records live in
//! the in-memory repository and external tools are faked.

#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use mediaflow_api::setup::{routes, services};
use mediaflow_core::{Config, EngineConfig, InMemoryMediaRepository};
use mediaflow_processing::{CommandRunner, ToolError, ToolInvocation};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// Answers `-version` and writes a placeholder at an ffmpeg output path.
struct NoopRunner;

#[async_trait]
impl CommandRunner for NoopRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<Vec<u8>, ToolError> {
        if invocation.args == ["-version"] {
            return Ok(Vec::new());
        }
        if let Some(output) = invocation.args.last() {
            let output = Path::new(output);
            if let Some(parent) = output.parent() {
                tokio::fs::create_dir_all(parent).await.unwrap();
            }
            tokio::fs::write(output, b"fake-media").await.unwrap();
        }
        Ok(Vec::new())
    }
}

/// Test application: server and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub upload_dir: std::path::PathBuf,
    _cleanup_task: JoinHandle<()>,
    _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._cleanup_task.abort();
    }
}

pub async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let engine = EngineConfig::with_dirs(
        temp_dir.path().join("uploads"),
        temp_dir.path().join("tmp"),
    );
    let upload_dir = engine.upload_dir.clone();
    let config = Config::with_engine(engine);

    let (state, cleanup_task) = services::initialize_services(
        &config,
        Arc::new(InMemoryMediaRepository::new()),
        Arc::new(NoopRunner),
    )
    .await
    .unwrap();
    let router = routes::setup_routes(state);

    TestApp {
        server: TestServer::new(router).unwrap(),
        upload_dir,
        _cleanup_task: cleanup_task,
        _temp_dir: temp_dir,
    }
}
