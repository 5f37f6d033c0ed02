//! Error types for the question-answering loop.

use pcapai_core::PcapAiError;

use crate::state::QueryPhase;

/// A model-requested tool call that does not fit the declared schema.
///
/// Never escapes the orchestrator: the message is fed back to the model as
/// the tool result so it can correct itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("malformed arguments for {tool}: {reason}")]
    MalformedArguments { tool: String, reason: String },
    #[error("missing parameter '{parameter}' for {tool}")]
    MissingParameter { tool: String, parameter: String },
    #[error("parameter '{parameter}' of {tool} must be {expected}")]
    WrongType {
        tool: String,
        parameter: String,
        expected: &'static str,
    },
    #[error("invalid value for '{parameter}' of {tool}: {reason}")]
    InvalidValue {
        tool: String,
        parameter: String,
        reason: String,
    },
    #[error("unexpected parameter '{parameter}' for {tool}")]
    UnexpectedParameter { tool: String, parameter: String },
    #[error("too many filters: {count} (limit {limit})")]
    TooManyFilters { count: usize, limit: usize },
}

/// Failures of the language-model transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("model transport failed: {0}")]
    Transport(String),
    #[error("model call timed out after {0} seconds")]
    Timeout(u64),
    #[error("model returned an invalid response: {0}")]
    InvalidResponse(String),
    #[error("model unavailable: {0}")]
    Unavailable(String),
}

impl ModelError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ModelError::Transport(_) | ModelError::Timeout(_))
    }
}

/// Errors surfaced to the caller of `ask`.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("question cannot be empty")]
    EmptyQuestion,
    #[error("question exceeds maximum length of {0} characters")]
    QuestionTooLong(usize),
    #[error("invalid query transition: {0} -> {1}")]
    InvalidTransition(QueryPhase, QueryPhase),
}

impl From<ChatError> for PcapAiError {
    fn from(err: ChatError) -> Self {
        PcapAiError::Chat(err.to_string())
    }
}

impl From<ModelError> for PcapAiError {
    fn from(err: ModelError) -> Self {
        PcapAiError::Model(err.to_string())
    }
}
