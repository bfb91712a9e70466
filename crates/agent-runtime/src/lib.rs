//! # agent-runtime
//!
//! Runtime providers for the agent host.
//!
//! ## Providers
//!
//! - **OpenAI** (default): Chat Completions API with streamed tool calls.
//!   Any endpoint speaking the same wire format works through
//!   [`OpenAiConfig::base_url`](openai::OpenAiConfig).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::openai::{OpenAiConfig, OpenAiProvider};
//!
//! let provider = OpenAiProvider::new(OpenAiConfig::new(api_key))?;
//! let agent = AgentBuilder::new()
//!     .provider(Arc::new(provider))
//!     .build()?;
//! ```

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "openai")]
pub use openai::{OpenAiConfig, OpenAiProvider};

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentError, LlmProvider, Message, Result, Role, Session, Tool, ToolRegistry,
};
