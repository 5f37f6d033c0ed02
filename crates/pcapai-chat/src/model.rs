//! Language-model boundary.
//!
//! The orchestrator only talks to a [`LanguageModel`]. [`CommandModel`]
//! exchanges JSON with an external program over stdin/stdout, one process per
//! request. [`ScriptedModel`] replays canned responses and [`OfflineModel`]
//! is always unavailable.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use pcapai_core::config::ModelConfig;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::ModelError;
use crate::types::{ModelRequest, ModelResponse, ToolCall};

/// A stateless request/response model transport.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier for logs.
    fn name(&self) -> &str;

    async fn respond(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError>;
}

// =============================================================================
// Wire format
// =============================================================================

/// `{"content": "..."}` or `{"tool_calls": [{"id", "name", "arguments"}]}`.
#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

/// Decode one transport response.
///
/// Tool calls win over content when a response carries both.
pub fn decode_response(bytes: &[u8]) -> Result<ModelResponse, ModelError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ModelError::InvalidResponse(format!("non-utf8 output: {}", e)))?
        .trim();
    let wire: WireResponse = serde_json::from_str(text).map_err(|e| {
        let preview: String = text.chars().take(200).collect();
        ModelError::InvalidResponse(format!("{} in {:?}", e, preview))
    })?;
    if !wire.tool_calls.is_empty() {
        return Ok(ModelResponse::ToolCalls(wire.tool_calls));
    }
    match wire.content {
        Some(content) => Ok(ModelResponse::Text(content)),
        None => Err(ModelError::InvalidResponse(
            "response has neither content nor tool_calls".to_string(),
        )),
    }
}

// =============================================================================
// CommandModel
// =============================================================================

/// Runs an external program per request: the request JSON goes to its stdin,
/// the response JSON is read from its stdout.
#[derive(Debug, Clone)]
pub struct CommandModel {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandModel {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Build from config; `None` when no command is configured.
    pub fn from_config(config: &ModelConfig) -> Option<Self> {
        let command = config.command.as_deref()?.trim();
        if command.is_empty() {
            return None;
        }
        Some(Self::new(
            command,
            config.args.clone(),
            Duration::from_secs(config.timeout_secs),
        ))
    }

    async fn run(&self, payload: Vec<u8>) -> Result<std::process::Output, ModelError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ModelError::Unavailable(format!(
                    "failed to start model command `{}`: {}",
                    self.program.display(),
                    e
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ModelError::Transport("failed to open model command stdin".into()))?;
        // stdout and stderr are drained while the request is written, so a
        // command that talks before reading its input cannot stall on a full pipe.
        let write = async move {
            let written = stdin.write_all(&payload).await;
            drop(stdin);
            written
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output =
            output.map_err(|e| ModelError::Transport(format!("model command failed: {}", e)))?;
        match written {
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(ModelError::Transport(
                format!("failed to write request: {}", e),
            )),
            // A command that exits without reading everything is judged by its status.
            _ => Ok(output),
        }
    }
}

#[async_trait]
impl LanguageModel for CommandModel {
    fn name(&self) -> &str {
        self.program.to_str().unwrap_or("command")
    }

    async fn respond(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| ModelError::Transport(format!("failed to encode request: {}", e)))?;
        debug!(
            program = %self.program.display(),
            messages = request.messages.len(),
            bytes = payload.len(),
            "Invoking model command"
        );

        let output = tokio::time::timeout(self.timeout, self.run(payload))
            .await
            .map_err(|_| ModelError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ModelError::Transport(format!(
                "model command `{}` failed (exit={:?}): {}",
                self.program.display(),
                output.status.code(),
                stderr.trim()
            )));
        }
        decode_response(&output.stdout)
    }
}

// =============================================================================
// ScriptedModel
// =============================================================================

/// Replays a fixed sequence of responses, then an optional repeating one.
///
/// Every request is recorded for inspection.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<ModelResponse, ModelError>>>,
    repeat: Option<ModelResponse>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Result<ModelResponse, ModelError>>,
    {
        Self {
            script: Mutex::new(responses.into_iter().collect()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with `response` once the script runs out.
    pub fn repeating(mut self, response: ModelResponse) -> Self {
        self.repeat = Some(response);
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn respond(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        self.requests
            .lock()
            .map_err(|e| ModelError::Transport(format!("request log poisoned: {}", e)))?
            .push(request.clone());
        let next = self
            .script
            .lock()
            .map_err(|e| ModelError::Transport(format!("script poisoned: {}", e)))?
            .pop_front();
        match (next, &self.repeat) {
            (Some(response), _) => response,
            (None, Some(repeat)) => Ok(repeat.clone()),
            (None, None) => Err(ModelError::Unavailable("script exhausted".to_string())),
        }
    }
}

// =============================================================================
// OfflineModel
// =============================================================================

/// Used when no transport is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineModel;

#[async_trait]
impl LanguageModel for OfflineModel {
    fn name(&self) -> &str {
        "offline"
    }

    async fn respond(&self, _request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        Err(ModelError::Unavailable(
            "no model transport configured".to_string(),
        ))
    }
}
