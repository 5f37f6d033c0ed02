//! Per-question state machine.
//!
//! Start -> AwaitingModel -> ExecutingTool -> AwaitingModel (loop)
//! AwaitingModel -> Answered | Aborted

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::ChatError;
use crate::types::ConversationTurn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryPhase {
    Start,
    AwaitingModel,
    ExecutingTool,
    Answered,
    Aborted,
}

impl QueryPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, QueryPhase::Answered | QueryPhase::Aborted)
    }
}

impl fmt::Display for QueryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryPhase::Start => "start",
            QueryPhase::AwaitingModel => "awaiting_model",
            QueryPhase::ExecutingTool => "executing_tool",
            QueryPhase::Answered => "answered",
            QueryPhase::Aborted => "aborted",
        };
        write!(f, "{}", name)
    }
}

/// Validate that a phase transition is allowed.
///
/// Valid transitions:
/// - Start -> AwaitingModel
/// - AwaitingModel -> ExecutingTool
/// - AwaitingModel -> Answered
/// - AwaitingModel -> Aborted (round budget spent, model unreachable)
/// - ExecutingTool -> AwaitingModel
pub fn validate_transition(from: QueryPhase, to: QueryPhase) -> Result<(), ChatError> {
    let valid = matches!(
        (from, to),
        (QueryPhase::Start, QueryPhase::AwaitingModel)
            | (QueryPhase::AwaitingModel, QueryPhase::ExecutingTool)
            | (QueryPhase::AwaitingModel, QueryPhase::Answered)
            | (QueryPhase::AwaitingModel, QueryPhase::Aborted)
            | (QueryPhase::ExecutingTool, QueryPhase::AwaitingModel)
    );

    if valid {
        Ok(())
    } else {
        Err(ChatError::InvalidTransition(from, to))
    }
}

/// Working state of one question. Dropped when the question terminates.
#[derive(Debug, Clone)]
pub struct QueryState {
    id: Uuid,
    question: String,
    turns: Vec<ConversationTurn>,
    rounds: u32,
    phase: QueryPhase,
    last_tool_result: Option<String>,
}

impl QueryState {
    /// Start a question. `seed` precedes the question in the conversation.
    pub fn new(question: impl Into<String>, seed: Vec<ConversationTurn>) -> Self {
        let question = question.into();
        let mut turns = seed;
        turns.push(ConversationTurn::user(question.clone()));
        Self {
            id: Uuid::new_v4(),
            question,
            turns,
            rounds: 0,
            phase: QueryPhase::Start,
            last_tool_result: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Tool-invocation rounds executed so far.
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn phase(&self) -> QueryPhase {
        self.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn last_tool_result(&self) -> Option<&str> {
        self.last_tool_result.as_deref()
    }

    pub fn advance(&mut self, to: QueryPhase) -> Result<(), ChatError> {
        validate_transition(self.phase, to)?;
        debug!(query_id = %self.id, from = %self.phase, to = %to, "Query transition");
        self.phase = to;
        Ok(())
    }

    /// Count a tool-invocation round. Only valid while executing tools.
    pub fn begin_round(&mut self) {
        debug_assert_eq!(self.phase, QueryPhase::ExecutingTool);
        self.rounds += 1;
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn record_tool_result(&mut self, content: &str) {
        self.last_tool_result = Some(content.to_string());
    }
}
