//! External tool invocation.
//!
//! ffprobe and ffmpeg are executed through [`CommandRunner`] so that every
//! call carries a timeout and tests can substitute a scripted runner.

use async_trait::async_trait;
use mediaflow_core::{AppError, EngineConfig};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Longest stderr excerpt kept in error messages.
const STDERR_EXCERPT_LEN: usize = 2000;

/// One invocation of an external program.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        let arg = path.to_string_lossy().into_owned();
        self.arg(arg)
    }

    /// Program name without its directory, for logs and errors.
    pub fn tool_name(&self) -> &str {
        Path::new(&self.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.program)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed: {stderr}")]
    Failed {
        tool: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("{tool} timed out after {}s", timeout.as_secs())]
    Timeout { tool: String, timeout: Duration },
}

impl From<ToolError> for AppError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Timeout { tool, timeout } => AppError::ToolTimeout {
                tool,
                timeout_secs: timeout.as_secs(),
            },
            other => AppError::Probe(other.to_string()),
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion and return stdout. A non-zero exit is an error.
    async fn run(&self, invocation: &ToolInvocation) -> Result<Vec<u8>, ToolError>;
}

/// Runs programs as child processes. A child that outlives its timeout is
/// killed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<Vec<u8>, ToolError> {
        let tool = invocation.tool_name().to_string();
        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(invocation.timeout, child.wait_with_output()).await
        {
            Ok(result) => result.map_err(|source| ToolError::Spawn {
                tool: tool.clone(),
                source,
            })?,
            Err(_) => {
                tracing::warn!(
                    process.executable.name = %tool,
                    timeout_secs = invocation.timeout.as_secs(),
                    "External tool timed out, killed"
                );
                return Err(ToolError::Timeout {
                    tool,
                    timeout: invocation.timeout,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let excerpt = match stderr.char_indices().nth(STDERR_EXCERPT_LEN) {
                Some((idx, _)) => &stderr[..idx],
                None => stderr,
            };
            return Err(ToolError::Failed {
                tool,
                status: output.status.code(),
                stderr: excerpt.to_string(),
            });
        }

        Ok(output.stdout)
    }
}

/// Reject tool paths containing shell metacharacters.
fn validate_tool_path(path: &str) -> Result<(), AppError> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.trim().is_empty() {
        return Err(AppError::InvalidInput("Tool path must not be empty".to_string()));
    }
    if path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(AppError::InvalidInput(format!(
            "Tool path contains dangerous characters: {}",
            path
        )));
    }
    Ok(())
}

/// Configured ffmpeg/ffprobe pair sharing one runner.
#[derive(Clone)]
pub struct MediaTools {
    runner: Arc<dyn CommandRunner>,
    ffmpeg_path: String,
    ffprobe_path: String,
    probe_timeout: Duration,
    transcode_timeout: Duration,
}

impl MediaTools {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &EngineConfig) -> Result<Self, AppError> {
        validate_tool_path(&config.ffmpeg_path)?;
        validate_tool_path(&config.ffprobe_path)?;
        Ok(Self {
            runner,
            ffmpeg_path: config.ffmpeg_path.clone(),
            ffprobe_path: config.ffprobe_path.clone(),
            probe_timeout: config.probe_timeout(),
            transcode_timeout: config.transcode_timeout(),
        })
    }

    pub fn ffprobe_path(&self) -> &str {
        &self.ffprobe_path
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.ffmpeg_path
    }

    /// An ffprobe invocation bounded by the probe timeout.
    pub fn ffprobe(&self) -> ToolInvocation {
        ToolInvocation::new(&self.ffprobe_path, self.probe_timeout)
    }

    /// An ffmpeg invocation bounded by the transcode timeout.
    pub fn ffmpeg(&self) -> ToolInvocation {
        ToolInvocation::new(&self.ffmpeg_path, self.transcode_timeout)
    }

    pub async fn run(&self, invocation: &ToolInvocation) -> Result<Vec<u8>, ToolError> {
        let start = Instant::now();
        let result = self.runner.run(invocation).await;
        tracing::debug!(
            process.executable.name = %invocation.tool_name(),
            process.args_count = invocation.args.len(),
            success = result.is_ok(),
            duration_ms = start.elapsed().as_millis() as u64,
            "External tool finished"
        );
        result
    }

    /// Verify both tools can be executed. Called once at startup.
    pub async fn ensure_available(&self) -> Result<(), AppError> {
        for invocation in [
            ToolInvocation::new(&self.ffprobe_path, self.probe_timeout).arg("-version"),
            ToolInvocation::new(&self.ffmpeg_path, self.probe_timeout).arg("-version"),
        ] {
            self.run(&invocation).await.map_err(|e| {
                AppError::Internal(format!(
                    "{} is not available at '{}': {}",
                    invocation.tool_name(),
                    invocation.program,
                    e
                ))
            })?;
        }
        tracing::info!(
            ffprobe = %self.ffprobe_path,
            ffmpeg = %self.ffmpeg_path,
            "Media tools available"
        );
        Ok(())
    }
}
