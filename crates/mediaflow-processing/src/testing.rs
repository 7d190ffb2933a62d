use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crate::tool::{CommandRunner, ToolError, ToolInvocation};

/// Records invocations and fakes ffprobe/ffmpeg: ffprobe prints the scripted
/// output, ffmpeg writes a few bytes to its last argument.
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    calls: Mutex<Vec<ToolInvocation>>,
    probe_output: Vec<u8>,
    fail_when: Option<String>,
    timeout_when: Option<String>,
}

impl ScriptedRunner {
    pub fn with_probe_output(mut self, output: impl Into<Vec<u8>>) -> Self {
        self.probe_output = output.into();
        self
    }

    /// Fail any invocation with an argument containing `needle`.
    pub fn fail_when(mut self, needle: &str) -> Self {
        self.fail_when = Some(needle.to_string());
        self
    }

    pub fn timeout_when(mut self, needle: &str) -> Self {
        self.timeout_when = Some(needle.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().unwrap().clone()
    }
}

fn mentions(invocation: &ToolInvocation, needle: &Option<String>) -> bool {
    needle
        .as_deref()
        .is_some_and(|n| invocation.args.iter().any(|a| a.contains(n)))
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<Vec<u8>, ToolError> {
        self.calls.lock().unwrap().push(invocation.clone());
        tokio::time::sleep(Duration::from_millis(5)).await;

        if mentions(invocation, &self.fail_when) {
            return Err(ToolError::Failed {
                tool: invocation.tool_name().to_string(),
                status: Some(1),
                stderr: "scripted failure".to_string(),
            });
        }
        if mentions(invocation, &self.timeout_when) {
            return Err(ToolError::Timeout {
                tool: invocation.tool_name().to_string(),
                timeout: invocation.timeout,
            });
        }
        if invocation.args == ["-version"] {
            return Ok(Vec::new());
        }
        if invocation.tool_name().contains("ffprobe") {
            return Ok(self.probe_output.clone());
        }

        if let Some(output) = invocation.args.last() {
            let output = Path::new(output);
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(output, b"fake-media").unwrap();
        }
        Ok(Vec::new())
    }
}
