//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for chat-completion backends so the turn loop
//! never depends on a particular vendor client.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{LlmProvider, GenerationOptions};
//!
//! let provider = OpenAiProvider::new(config);
//! let completion = provider.complete(&messages, &tools, &options).await?;
//! ```

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::pin::Pin;

use crate::error::Result;
use crate::message::Message;
use crate::tool::{ToolCall, ToolSchema};

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "gpt-5.1")
    pub model: String,

    /// Temperature for sampling; `None` leaves the provider default
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

const fn default_max_tokens() -> u32 {
    4096
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "gpt-5.1".into(),
            temperature: None,
            max_tokens: default_max_tokens(),
        }
    }
}

/// Response from an LLM completion
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub content: String,

    /// Tool calls the model elected, in call order
    pub tool_calls: Vec<ToolCall>,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,

    /// Finish reason
    pub finish_reason: Option<FinishReason>,
}

/// Token usage statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason for completion finishing
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    ContentFilter,
    Error,
}

/// A chunk from a streaming completion
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Assistant text delta
    Text { delta: String },

    /// Partial tool call. `id` and `name` arrive on the first delta for an
    /// index; `arguments` is a fragment of the raw JSON string.
    ToolCall {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    },

    /// End of the completion
    Finish {
        reason: FinishReason,
        usage: Option<TokenUsage>,
    },
}

/// Stream type for completion streaming
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Folds stream chunks into a [`Completion`]
#[derive(Debug, Default)]
pub struct CompletionBuilder {
    content: String,
    /// Keyed by stream index; fragments may arrive in any index order
    calls: BTreeMap<usize, ToolCall>,
    usage: Option<TokenUsage>,
    finish_reason: Option<FinishReason>,
}

impl CompletionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a chunk. Returns the call id when this chunk starts a new tool
    /// call.
    pub fn push(&mut self, chunk: &StreamChunk) -> Option<String> {
        match chunk {
            StreamChunk::Text { delta } => {
                self.content.push_str(delta);
                None
            }
            StreamChunk::ToolCall { index, id, name, arguments } => {
                let started = !self.calls.contains_key(index);
                let call = self.calls.entry(*index).or_insert_with(|| {
                    let id = id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                    ToolCall::new(id, String::new(), String::new())
                });

                if let Some(id) = id {
                    call.id.clone_from(id);
                }
                if let Some(name) = name {
                    call.name.push_str(name);
                }
                call.arguments.push_str(arguments);

                started.then(|| call.id.clone())
            }
            StreamChunk::Finish { reason, usage } => {
                self.finish_reason = Some(*reason);
                self.usage = *usage;
                None
            }
        }
    }

    /// Current state of the call at `index`
    pub fn call(&self, index: usize) -> Option<&ToolCall> {
        self.calls.get(&index)
    }

    /// Finish the completion. Calls that never received a name are dropped.
    pub fn build(self) -> Completion {
        let tool_calls = self
            .calls
            .into_values()
            .filter(|call| {
                let named = !call.name.is_empty();
                if !named {
                    tracing::warn!(tool_call = %call.id, "Dropping tool call without a name");
                }
                named
            })
            .collect();

        Completion {
            content: self.content,
            tool_calls,
            usage: self.usage,
            finish_reason: self.finish_reason,
        }
    }
}

/// Provider metadata
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Provider name (e.g., "OpenAI")
    pub name: String,

    /// Available models
    pub models: Vec<ModelInfo>,

    /// Whether streaming is supported
    pub supports_streaming: bool,

    /// Whether tool/function calling is supported
    pub supports_tools: bool,
}

/// Information about a model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The agent works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get provider information and capabilities
    async fn info(&self) -> Result<ProviderInfo>;

    /// Check if the provider is reachable and accepts our credentials
    async fn health_check(&self) -> Result<bool>;

    /// Generate a streaming completion offering `tools` to the model
    async fn complete_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<CompletionStream>;

    /// Generate a completion by draining [`Self::complete_stream`]
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let mut stream = self.complete_stream(messages, tools, options).await?;
        let mut builder = CompletionBuilder::new();
        while let Some(chunk) = stream.next().await {
            builder.push(&chunk?);
        }
        Ok(builder.build())
    }

    /// List available models
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}
