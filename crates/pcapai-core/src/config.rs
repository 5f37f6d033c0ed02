use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PcapAiError, Result};

/// Top-level configuration for pcapai.
///
/// Loaded from `~/.pcapai/config.toml` by default. Each section corresponds
/// to one subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PcapAiConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

impl PcapAiConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PcapAiConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PcapAiError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the session snapshot.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.pcapai/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Session cache and capture parser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Persist the active session so later processes skip re-parsing.
    pub snapshot_enabled: bool,
    /// Snapshot database file name, relative to `general.data_dir`.
    pub snapshot_file: String,
    /// Restore the persisted session on startup.
    pub restore_on_start: bool,
    /// Program used to dissect capture files.
    pub tshark_path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            snapshot_enabled: true,
            snapshot_file: "session.db".to_string(),
            restore_on_start: true,
            tshark_path: "tshark".to_string(),
        }
    }
}

/// Tool-calling loop limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum tool-invocation rounds per question.
    pub max_rounds: u32,
    /// Maximum records returned to the model from one tool call.
    pub max_result_records: usize,
    /// Maximum predicates accepted in one conjunctive filter call.
    pub max_filters_per_call: usize,
    /// Previous question/answer exchanges replayed as context.
    pub history_turns: usize,
    /// Maximum question length in characters.
    pub max_question_chars: usize,
    /// Attempts per model call when the transport fails.
    pub model_retries: u32,
    /// Delay between transport retries in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            max_result_records: 50,
            max_filters_per_call: 8,
            history_turns: 3,
            max_question_chars: 4000,
            model_retries: 3,
            retry_delay_ms: 2000,
        }
    }
}

/// External model transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Program speaking the JSON request/response protocol on stdin/stdout.
    /// When unset, questions are answered offline from the capture summary.
    pub command: Option<String>,
    /// Extra arguments passed to `command`.
    pub args: Vec<String>,
    /// Model name forwarded in each request.
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            model: "gpt-4o".to_string(),
            temperature: 0.2,
            max_tokens: 1000,
            timeout_secs: 60,
        }
    }
}
