//! Reasoning Loop
//!
//! One run drives the model until it answers in plain text or hands control
//! back to the client for a frontend tool. Backend tools run in-process, in
//! the order the model called them; every call gets exactly one result in
//! the transcript.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;

use crate::error::{AgentError, Result};
use crate::message::{Message, Role};
use crate::protocol::{AgentEvent, EventSink, InputMessage, RunAgentInput, RunOutcome, ToolDeclaration};
use crate::provider::{CompletionBuilder, GenerationOptions, LlmProvider, StreamChunk};
use crate::session::Session;
use crate::state::StateSnapshot;
use crate::tool::{Tool, ToolCall, ToolContext, ToolRegistry, ToolResult, ToolSchema};

/// Result text recorded for a frontend call the client never answered
const CANCELLED: &str = "cancelled";

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Display name
    pub name: String,

    pub description: String,

    /// System prompt
    pub instructions: String,

    /// Maximum LLM calls per run
    pub max_iterations: usize,

    /// Generation options
    pub generation: GenerationOptions,

    /// State every new session starts from
    pub initial_state: StateSnapshot,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "Agent".into(),
            description: String::new(),
            instructions: "You are a helpful assistant.".into(),
            max_iterations: 10,
            generation: GenerationOptions::default(),
            initial_state: StateSnapshot::default(),
        }
    }
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Run one turn against `session`, streaming events into `sink`.
    ///
    /// The run is bracketed by `RUN_STARTED` and either `RUN_FINISHED` or
    /// `RUN_ERROR`. Errors are also returned so the caller can log them.
    pub async fn run_turn(
        &self,
        session: &mut Session,
        input: RunAgentInput,
        sink: &EventSink,
    ) -> Result<RunOutcome> {
        let thread_id = input.thread_id.clone();
        let run_id = input.run_id.clone();

        sink.emit(AgentEvent::RunStarted {
            thread_id: thread_id.clone(),
            run_id: run_id.clone(),
        })
        .await;

        let result = self.drive(session, input, sink).await;
        session.touch();

        sink.emit(AgentEvent::StateSnapshot {
            snapshot: session.state.snapshot(),
        })
        .await;

        match &result {
            Ok(outcome) => {
                sink.emit(AgentEvent::RunFinished {
                    thread_id,
                    run_id,
                    outcome: outcome.clone(),
                })
                .await;
            }
            Err(e) => {
                tracing::error!(session = %session.id, run = %run_id, error = %e, "Run failed");
                sink.emit(AgentEvent::RunError {
                    message: e.user_message(),
                    code: e.code().into(),
                })
                .await;
            }
        }

        result
    }

    async fn drive(
        &self,
        session: &mut Session,
        input: RunAgentInput,
        sink: &EventSink,
    ) -> Result<RunOutcome> {
        session.conversation.ensure_system_prompt(&self.config.instructions);

        if let Some(state) = input.state {
            if session.state.apply_snapshot(state) {
                tracing::debug!(session = %session.id, "Adopted client state");
            }
        }

        merge_input(session, input.messages);

        let (schemas, frontend) = self.offered_tools(&input.tools);

        for iteration in 1..=self.config.max_iterations {
            if sink.is_closed() {
                tracing::warn!(session = %session.id, "Client disconnected, stopping run");
                return Err(AgentError::Session("client disconnected".into()));
            }

            session.conversation.truncate_to_fit();
            tracing::debug!(session = %session.id, iteration, "Requesting completion");

            let calls = self.stream_completion(session, &schemas, sink).await?;
            if calls.is_empty() {
                return Ok(RunOutcome::Success);
            }

            for call in calls {
                if frontend.contains(&call.name) {
                    tracing::debug!(tool = %call.name, id = %call.id, "Awaiting client result");
                    session.add_pending(call);
                } else {
                    self.execute_call(session, &call, sink).await;
                }
            }

            if !session.pending_calls().is_empty() {
                let pending_tool_calls = session
                    .pending_calls()
                    .iter()
                    .map(|p| p.call.id.clone())
                    .collect();
                return Ok(RunOutcome::Interrupt { pending_tool_calls });
            }
        }

        Err(AgentError::MaxIterations(self.config.max_iterations))
    }

    /// Backend schemas plus client declarations. A declaration that shadows a
    /// backend tool is dropped.
    fn offered_tools(&self, declared: &[ToolDeclaration]) -> (Vec<ToolSchema>, HashSet<String>) {
        let mut schemas = self.tools.schemas();
        let mut frontend = HashSet::new();

        for decl in declared {
            if self.tools.contains(&decl.name) {
                tracing::warn!(tool = %decl.name, "Client tool shadows a backend tool, ignoring");
                continue;
            }
            if frontend.insert(decl.name.clone()) {
                schemas.push(ToolSchema::from(decl));
            }
        }

        (schemas, frontend)
    }

    /// Stream one completion, forwarding deltas, and record the assistant
    /// message. Returns the calls the model made.
    async fn stream_completion(
        &self,
        session: &mut Session,
        schemas: &[ToolSchema],
        sink: &EventSink,
    ) -> Result<Vec<ToolCall>> {
        let mut stream = self
            .provider
            .complete_stream(session.conversation.messages(), schemas, &self.config.generation)
            .await?;

        let message_id = uuid::Uuid::new_v4().to_string();
        let mut builder = CompletionBuilder::new();
        let mut text_open = false;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let started = builder.push(&chunk);

            match chunk {
                StreamChunk::Text { delta } if !delta.is_empty() => {
                    if !text_open {
                        text_open = true;
                        sink.emit(AgentEvent::TextMessageStart {
                            message_id: message_id.clone(),
                            role: Role::Assistant,
                        })
                        .await;
                    }
                    sink.emit(AgentEvent::TextMessageContent {
                        message_id: message_id.clone(),
                        delta,
                    })
                    .await;
                }
                StreamChunk::ToolCall { index, arguments, .. } => {
                    let Some(call) = builder.call(index) else {
                        continue;
                    };
                    let tool_call_id = call.id.clone();

                    if started.is_some() {
                        sink.emit(AgentEvent::ToolCallStart {
                            tool_call_id: tool_call_id.clone(),
                            tool_call_name: call.name.clone(),
                            parent_message_id: Some(message_id.clone()),
                        })
                        .await;
                    }
                    if !arguments.is_empty() {
                        sink.emit(AgentEvent::ToolCallArgs {
                            tool_call_id,
                            delta: arguments,
                        })
                        .await;
                    }
                }
                _ => {}
            }
        }

        if text_open {
            sink.emit(AgentEvent::TextMessageEnd {
                message_id: message_id.clone(),
            })
            .await;
        }

        let completion = builder.build();
        for call in &completion.tool_calls {
            sink.emit(AgentEvent::ToolCallEnd {
                tool_call_id: call.id.clone(),
            })
            .await;
        }

        if let Some(usage) = completion.usage {
            tracing::debug!(
                prompt = usage.prompt_tokens,
                completion = usage.completion_tokens,
                "Token usage"
            );
        }

        let calls = completion.tool_calls.clone();
        session
            .conversation
            .push(Message::assistant_with_calls(completion.content, completion.tool_calls).with_id(message_id));

        Ok(calls)
    }

    /// Run a backend call and record its result. Failures become failed
    /// results the model can read; they never abort the run.
    async fn execute_call(&self, session: &mut Session, call: &ToolCall, sink: &EventSink) {
        let version = session.state.version();

        let outcome = {
            let mut ctx = ToolContext {
                session_id: &session.id,
                state: &mut session.state,
            };
            self.tools.execute(call, &mut ctx).await
        };

        let result = outcome.unwrap_or_else(|e| {
            tracing::warn!(
                tool = %call.name,
                arguments = %call.arguments,
                error = %e,
                "Tool call failed"
            );
            ToolResult::failure(&call.name, e.to_string()).with_id(&call.id)
        });

        let message = Message::tool(result.content(), &call.id);
        sink.emit(AgentEvent::ToolCallResult {
            message_id: message.id.clone(),
            tool_call_id: call.id.clone(),
            content: message.content.clone(),
            success: result.success,
        })
        .await;
        session.conversation.push(message);

        if session.state.version() != version {
            sink.emit(AgentEvent::StateSnapshot {
                snapshot: session.state.snapshot(),
            })
            .await;
        }
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Fold the client's transcript into the session.
///
/// Messages already recorded are skipped. Client results close pending
/// calls; whatever is still pending when a new user message arrives (or the
/// input ends) is closed as cancelled, so every call stays paired.
fn merge_input(session: &mut Session, messages: Vec<InputMessage>) {
    for input in messages {
        if session.conversation.contains(&input.id) {
            continue;
        }

        let message = Message::from(input);
        match message.role {
            Role::System => {
                tracing::debug!(id = %message.id, "Ignoring client system message");
            }
            Role::Tool => {
                let Some(call_id) = message.tool_call_id.clone() else {
                    tracing::warn!(id = %message.id, "Tool message without a call id, ignoring");
                    continue;
                };
                if session.resolve_pending(&call_id) {
                    session.conversation.push(message);
                } else if !session.conversation.has_result_for(&call_id) {
                    tracing::warn!(tool_call_id = %call_id, "Result for an unknown tool call, ignoring");
                }
            }
            Role::User => {
                cancel_unanswered(session);
                session.conversation.push(message);
            }
            Role::Assistant => {
                if message.tool_calls.is_empty() {
                    session.conversation.push(message);
                } else {
                    tracing::warn!(id = %message.id, "Unknown assistant tool calls from client, ignoring");
                }
            }
        }
    }

    cancel_unanswered(session);
}

fn cancel_unanswered(session: &mut Session) {
    let cancelled = session.cancel_pending(CANCELLED);
    if !cancelled.is_empty() {
        tracing::info!(session = %session.id, calls = ?cancelled, "Cancelled unanswered tool calls");
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    config: AgentConfig,
    error: Option<AgentError>,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
            error: None,
        }
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Register a tool; a duplicate name fails [`Self::build`]
    #[must_use]
    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        if let Err(e) = self.tools.register(tool) {
            self.error.get_or_insert(e);
        }
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.config.description = description.into();
        self
    }

    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.config.instructions = instructions.into();
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    #[must_use]
    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = Some(temp);
        self
    }

    #[must_use]
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    #[must_use]
    pub fn initial_state(mut self, state: StateSnapshot) -> Self {
        self.config.initial_state = state;
        self
    }

    pub fn build(self) -> Result<Agent> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        Ok(Agent::new(provider, Arc::new(self.tools), self.config))
    }
}
