//! Tool-calling orchestrator.
//!
//! Runs one question to completion: seeds the conversation, alternates
//! between the model and validated filter calls, and terminates as
//! `Answered` (model produced text) or `Aborted` (round budget spent, model
//! unreachable). The session is only ever read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pcapai_core::config::{ModelConfig, OrchestratorConfig};
use pcapai_core::PcapAiConfig;
use pcapai_filter::CaptureSummary;
use pcapai_session::CaptureSession;
use tracing::{info, warn};

use crate::error::{ChatError, ModelError};
use crate::history::ConversationHistory;
use crate::model::LanguageModel;
use crate::prompt::{offline_answer, round_limit_answer, system_prompt};
use crate::result::{filter_result, summary_result, validation_result, ToolOutput};
use crate::state::{QueryPhase, QueryState};
use crate::tools::{tool_definitions, ToolDefinition};
use crate::types::{Answer, ConversationTurn, ModelRequest, ModelResponse, Termination, ToolCall};
use crate::validate::{validate_call, ToolAction, ValidatedCall};

/// Mediates between one question and the language model.
pub struct Orchestrator {
    model: Arc<dyn LanguageModel>,
    settings: OrchestratorConfig,
    model_config: ModelConfig,
    tools: Vec<ToolDefinition>,
    executions: AtomicU64,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn LanguageModel>, config: &PcapAiConfig) -> Self {
        let settings = config.orchestrator.clone();
        let tools = tool_definitions(settings.max_filters_per_call);
        Self {
            model,
            settings,
            model_config: config.model.clone(),
            tools,
            executions: AtomicU64::new(0),
        }
    }

    /// Validated tool calls executed against a session so far.
    pub fn tool_executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    /// Answer one question about `session`.
    ///
    /// Errors only for questions that are empty or too long; model failures
    /// and budget overruns end as `Aborted` answers. Dropping the returned
    /// future abandons the question without touching the session.
    pub async fn ask(
        &self,
        session: &CaptureSession,
        history: &ConversationHistory,
        question: &str,
    ) -> Result<Answer, ChatError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyQuestion);
        }
        if question.chars().count() > self.settings.max_question_chars {
            return Err(ChatError::QuestionTooLong(self.settings.max_question_chars));
        }

        let summary = CaptureSummary::from_records(session.records());
        let mut seed = vec![ConversationTurn::system(system_prompt(
            session.identity(),
            &summary,
            session.focus(),
            self.settings.max_rounds,
        ))];
        seed.extend(history.recent_turns(self.settings.history_turns));

        let mut state = QueryState::new(question, seed);
        info!(
            query_id = %state.id(),
            records = session.records().len(),
            focus = ?session.focus(),
            "Question received"
        );
        state.advance(QueryPhase::AwaitingModel)?;

        loop {
            let request = self.request(&state);
            let response = match self.call_model(&request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(query_id = %state.id(), error = %e, "Model unreachable, answering offline");
                    state.advance(QueryPhase::Aborted)?;
                    let text = offline_answer(
                        state.question(),
                        &e.to_string(),
                        &summary,
                        state.last_tool_result(),
                    );
                    return Ok(finish(&state, text, Termination::Aborted));
                }
            };

            match response {
                ModelResponse::Text(text) => {
                    state.advance(QueryPhase::Answered)?;
                    return Ok(finish(&state, text, Termination::Answered));
                }
                ModelResponse::ToolCalls(calls) => {
                    if state.rounds() >= self.settings.max_rounds {
                        warn!(
                            query_id = %state.id(),
                            max_rounds = self.settings.max_rounds,
                            "Round budget exhausted"
                        );
                        state.advance(QueryPhase::Aborted)?;
                        let text =
                            round_limit_answer(state.rounds(), state.last_tool_result(), &summary);
                        return Ok(finish(&state, text, Termination::Aborted));
                    }
                    state.advance(QueryPhase::ExecutingTool)?;
                    state.begin_round();
                    self.run_tools(&mut state, calls, session);
                    state.advance(QueryPhase::AwaitingModel)?;
                }
            }
        }
    }

    fn run_tools(&self, state: &mut QueryState, calls: Vec<ToolCall>, session: &CaptureSession) {
        let round = state.rounds();
        let calls: Vec<ToolCall> = calls
            .into_iter()
            .enumerate()
            .map(|(i, mut call)| {
                if call.id.is_empty() {
                    call.id = format!("call_{}_{}", round, i + 1);
                }
                call
            })
            .collect();
        state.push(ConversationTurn::tool_request(calls.clone()));

        for call in calls {
            let content = match validate_call(&call, self.settings.max_filters_per_call) {
                Ok(validated) => {
                    let output = self.execute(&validated, session);
                    info!(
                        query_id = %state.id(),
                        round,
                        tool = %call.name,
                        matched = output.matched,
                        truncated = output.truncated,
                        "Tool call executed"
                    );
                    state.record_tool_result(&output.content);
                    output.content
                }
                Err(e) => {
                    info!(
                        query_id = %state.id(),
                        round,
                        tool = %call.name,
                        error = %e,
                        "Tool call rejected"
                    );
                    validation_result(&call.name, &e)
                }
            };
            state.push(ConversationTurn::tool_result(call.id, content));
        }
    }

    /// Run a validated call against the session's records, applying its focus.
    pub fn execute(&self, call: &ValidatedCall, session: &CaptureSession) -> ToolOutput {
        self.executions.fetch_add(1, Ordering::Relaxed);
        let query = call.query().clone().with_focus(session.focus());
        let matched = query.apply(session.records());
        match call.action {
            ToolAction::Filter(_) => filter_result(
                call.kind.name(),
                &query,
                &matched,
                self.settings.max_result_records,
            ),
            ToolAction::Summary(_) => {
                summary_result(call.kind.name(), &query, &CaptureSummary::from_records(matched))
            }
        }
    }

    fn request(&self, state: &QueryState) -> ModelRequest {
        ModelRequest {
            model: self.model_config.model.clone(),
            temperature: self.model_config.temperature,
            max_tokens: self.model_config.max_tokens,
            messages: state.turns().to_vec(),
            tools: self.tools.clone(),
        }
    }

    /// One model exchange, retrying transient failures.
    ///
    /// `model_retries` is the total number of attempts.
    async fn call_model(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        let attempts = self.settings.model_retries.max(1);
        let mut attempt = 1;
        loop {
            match self.model.respond(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(
                        model = self.model.name(),
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Model call failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(self.settings.retry_delay_ms)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn finish(state: &QueryState, text: String, terminated: Termination) -> Answer {
    info!(
        query_id = %state.id(),
        terminated = %terminated,
        rounds_used = state.rounds(),
        "Question finished"
    );
    Answer {
        answer: text,
        terminated,
        rounds_used: state.rounds(),
    }
}
