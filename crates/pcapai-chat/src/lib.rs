//! Question answering over a loaded capture.
//!
//! A language model iteratively requests filtered views of the session's
//! records through a declared tool schema; every call is validated before the
//! filter engine sees it, and each question is bounded by a round budget.

pub mod error;
pub mod history;
pub mod model;
pub mod orchestrator;
pub mod prompt;
pub mod result;
pub mod state;
pub mod tools;
pub mod types;
pub mod validate;

pub use error::{ChatError, ModelError, ValidationError};
pub use history::{ConversationHistory, Exchange};
pub use model::{decode_response, CommandModel, LanguageModel, OfflineModel, ScriptedModel};
pub use orchestrator::Orchestrator;
pub use result::ToolOutput;
pub use state::{validate_transition, QueryPhase, QueryState};
pub use tools::{tool_definitions, ToolDefinition, ToolKind};
pub use types::{
    Answer, ConversationTurn, ModelRequest, ModelResponse, Role, Termination, ToolCall,
};
pub use validate::{validate_call, ToolAction, ValidatedCall};
