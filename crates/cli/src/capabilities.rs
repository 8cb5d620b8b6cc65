//! Command-backed capability adapters: each capability is an external
//! program that reads a JSON request on stdin and prints its reply to
//! stdout. Keeps the core free of any provider-specific client.

use anyhow::{Context as AnyhowContext, Result};
use async_trait::async_trait;
use noteflow_context::FileSelector;
use noteflow_protocol::contracts::StructuringRequest;
use noteflow_synth::StructuringCapability;
use serde::Serialize;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Serialize)]
struct SelectionRequest<'a> {
    tree: &'a str,
    raw_text: &'a str,
}

/// Runs a shell command with the serialized request on stdin and returns
/// its stdout as the capability reply.
pub struct CommandCapability {
    command: String,
}

impl CommandCapability {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    async fn invoke<T: Serialize>(&self, request: &T) -> Result<String> {
        let payload = serde_json::to_vec(request)?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("spawn capability command: {}", self.command))?;

        let mut stdin = child.stdin.take().context("capability stdin unavailable")?;
        stdin.write_all(&payload).await?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("wait for capability command: {}", self.command))?;
        if !output.status.success() {
            anyhow::bail!(
                "capability command exited with {}: {}",
                output.status,
                self.command
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl StructuringCapability for CommandCapability {
    async fn structure(&self, request: &StructuringRequest) -> Result<String> {
        self.invoke(request).await
    }
}

#[async_trait]
impl FileSelector for CommandCapability {
    async fn select(&self, tree: &str, raw_text: &str) -> Result<String> {
        self.invoke(&SelectionRequest { tree, raw_text }).await
    }
}

/// Selector used when no selector command is configured: discovery degrades
/// to empty context instead of failing the cycle.
pub struct NoSelector;

#[async_trait]
impl FileSelector for NoSelector {
    async fn select(&self, _tree: &str, _raw_text: &str) -> Result<String> {
        Ok(r#"{"explicit": [], "discovered": [], "reasoning": "no selector configured"}"#
            .to_string())
    }
}
