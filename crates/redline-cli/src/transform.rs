//! # External Transform Command
//!
//! [`CommandTransform`] backs the pipeline's [`TextTransform`] with a shell
//! command. Each call runs `sh -c CMD`, writes one JSON object
//! `{"text": ..., "instruction": ...}` to its stdin, and takes its stdout,
//! unchanged, as the new article text. A non-zero exit status is a
//! transform failure carrying the command's stderr.

use std::process::Stdio;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use redline_pipeline::{TextTransform, TransformError};

#[derive(Serialize)]
struct TransformRequest<'a> {
    text: &'a str,
    instruction: &'a str,
}

#[derive(Debug, Clone)]
pub struct CommandTransform {
    command: String,
}

impl CommandTransform {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl TextTransform for CommandTransform {
    async fn transform(&self, current_text: &str, instruction: &str) -> Result<String, TransformError> {
        let request = serde_json::to_vec(&TransformRequest {
            text: current_text,
            instruction,
        })
        .map_err(|e| TransformError::Failed(format!("encoding request: {e}")))?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TransformError::Failed(format!("spawning {:?}: {e}", self.command)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A command that ignores its input may exit before reading it.
            match stdin.write_all(&request).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(TransformError::Failed(format!("writing request: {e}"))),
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| TransformError::Failed(format!("waiting for {:?}: {e}", self.command)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(command = %self.command, status = %output.status, "transform command failed");
            return Err(TransformError::Failed(format!(
                "{:?} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }
        String::from_utf8(output.stdout)
            .map_err(|e| TransformError::Failed(format!("output is not UTF-8: {e}")))
    }
}
