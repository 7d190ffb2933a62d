//! Test helpers: an engine over temporary directories, an in-memory
//! repository and a fake ffmpeg/ffprobe runner.
//!
//! Run from workspace root: `cargo test -p mediaflow-services`.

#![allow(dead_code)]

use async_trait::async_trait;
use mediaflow_core::models::MediaRecord;
use mediaflow_core::{AppError, EngineConfig, InMemoryMediaRepository, ReadyObserver};
use mediaflow_processing::{CommandRunner, ToolError, ToolInvocation};
use mediaflow_services::{MediaEngine, MediaTagExtractor, MediaTools, MetadataObserver};
use mediaflow_storage::LocalMediaStore;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// ffprobe JSON for a two-minute 1080p video with one audio stream.
pub const LONG_VIDEO_PROBE: &str = r#"{
    "streams": [
        {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080, "r_frame_rate": "30/1"},
        {"codec_type": "audio", "codec_name": "aac", "channels": 2, "sample_rate": "48000"}
    ],
    "format": {"duration": "120.000000", "format_name": "mov,mp4,m4a,3gp,3g2,mj2"}
}"#;

/// ffprobe JSON for an eight-second 720p video.
pub const SHORT_VIDEO_PROBE: &str = r#"{
    "streams": [{"codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720}],
    "format": {"duration": "8.0"}
}"#;

/// Start of an ISO-BMFF file, enough to sniff as video/mp4.
pub fn mp4_bytes() -> Vec<u8> {
    let mut data = b"\x00\x00\x00\x20ftypisom\x00\x00\x02\x00isomiso2avc1mp41".to_vec();
    data.resize(4096, 0);
    data
}

/// Stands in for ffmpeg and ffprobe.
///
/// ffprobe gets the configured JSON (or the bare duration for
/// `nokey` queries). ffmpeg writes a small file at its last argument.
/// Any invocation with an argument containing the failure needle fails.
#[derive(Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<ToolInvocation>>,
    probe_json: Mutex<String>,
    fail_when: Mutex<Option<String>>,
}

impl FakeRunner {
    pub fn with_probe(json: &str) -> Self {
        let runner = Self::default();
        runner.set_probe(json);
        runner
    }

    pub fn set_probe(&self, json: &str) {
        *self.probe_json.lock().unwrap() = json.to_string();
    }

    pub fn fail_when(&self, needle: &str) {
        *self.fail_when.lock().unwrap() = Some(needle.to_string());
    }

    pub fn clear_failure(&self) {
        *self.fail_when.lock().unwrap() = None;
    }

    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn ffmpeg_calls(&self) -> Vec<ToolInvocation> {
        self.calls()
            .into_iter()
            .filter(|c| c.tool_name() == "ffmpeg")
            .collect()
    }

    fn probe_duration(&self) -> String {
        let json = self.probe_json.lock().unwrap().clone();
        serde_json::from_str::<serde_json::Value>(&json)
            .ok()
            .and_then(|v| v["format"]["duration"].as_str().map(str::to_string))
            .unwrap_or_else(|| "N/A".to_string())
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<Vec<u8>, ToolError> {
        self.calls.lock().unwrap().push(invocation.clone());

        let needle = self.fail_when.lock().unwrap().clone();
        if let Some(needle) = needle {
            if invocation.args.iter().any(|a| a.contains(&needle)) {
                return Err(ToolError::Failed {
                    tool: invocation.tool_name().to_string(),
                    status: Some(1),
                    stderr: format!("fake failure on {}", needle),
                });
            }
        }

        if invocation.args == ["-version"] {
            return Ok(b"fake version".to_vec());
        }
        if invocation.tool_name() == "ffprobe" {
            if invocation.args.iter().any(|a| a.contains("nokey=1")) {
                return Ok(format!("{}\n", self.probe_duration()).into_bytes());
            }
            return Ok(self.probe_json.lock().unwrap().clone().into_bytes());
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

/// Records the ids it sees, in order, and fails when asked to.
pub struct RecordingObserver {
    pub name: &'static str,
    pub log: Arc<Mutex<Vec<String>>>,
    pub fail: bool,
}

impl RecordingObserver {
    pub fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            log: log.clone(),
            fail,
        })
    }
}

#[async_trait]
impl ReadyObserver for RecordingObserver {
    fn name(&self) -> &str {
        self.name
    }

    async fn on_ready(&self, record: &MediaRecord) -> Result<(), AppError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.name, record.id));
        if self.fail {
            return Err(AppError::Internal("observer refused".to_string()));
        }
        Ok(())
    }
}

pub struct TestEngine {
    pub engine: MediaEngine,
    pub repo: Arc<InMemoryMediaRepository>,
    pub runner: Arc<FakeRunner>,
    pub config: EngineConfig,
    _temp_dir: TempDir,
}

impl TestEngine {
    pub fn upload_path(&self, key: &str) -> PathBuf {
        self.config.upload_dir.join(key)
    }

    pub fn previews_dir(&self) -> PathBuf {
        self.config.temporary_dir.join("previews")
    }
}

pub async fn setup_engine(runner: FakeRunner) -> TestEngine {
    build_engine(runner, |_, _, _| Vec::new()).await
}

pub async fn setup_engine_with_observers(
    runner: FakeRunner,
    observers: Vec<Arc<dyn ReadyObserver>>,
) -> TestEngine {
    build_engine(runner, move |_, _, _| observers).await
}

/// Engine with the default metadata observer registered.
pub async fn setup_engine_with_metadata(runner: FakeRunner) -> TestEngine {
    build_engine(runner, |repo, tools, store| {
        let observer: Arc<dyn ReadyObserver> = Arc::new(MetadataObserver::new(
            repo,
            Arc::new(MediaTagExtractor::new(tools)),
            store,
        ));
        vec![observer]
    })
    .await
}

async fn build_engine<F>(runner: FakeRunner, observers: F) -> TestEngine
where
    F: FnOnce(Arc<InMemoryMediaRepository>, MediaTools, LocalMediaStore) -> Vec<Arc<dyn ReadyObserver>>,
{
    let temp_dir = TempDir::new().unwrap();
    let config = EngineConfig::with_dirs(
        temp_dir.path().join("uploads"),
        temp_dir.path().join("tmp"),
    );
    let runner = Arc::new(runner);
    let repo = Arc::new(InMemoryMediaRepository::new());
    let tools = MediaTools::new(runner.clone(), &config).unwrap();
    let store = LocalMediaStore::new(config.upload_dir.clone()).await.unwrap();

    let observers = observers(repo.clone(), tools.clone(), store);
    let engine = MediaEngine::new(&config, repo.clone(), tools, observers)
        .await
        .unwrap();

    TestEngine {
        engine,
        repo,
        runner,
        config,
        _temp_dir: temp_dir,
    }
}
