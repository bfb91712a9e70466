//! # agent-core
//!
//! Core agent logic: provider-agnostic LLM abstraction, a validated tool
//! registry, per-session shared state and the streaming turn loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Agent                               │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐   │
//! │  │  Turn Loop  │──│    Tools    │  │   LlmProvider       │   │
//! │  │ (reasoning) │  │   Registry  │  │   (Strategy)        │   │
//! │  └──────┬──────┘  └─────────────┘  └─────────────────────┘   │
//! │         │ AgentEvent                                         │
//! │  ┌──────▼──────┐  ┌─────────────┐                            │
//! │  │  EventSink  │  │  Sessions   │ SharedState + pending calls│
//! │  └─────────────┘  └─────────────┘                            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait keeps the loop independent of any one vendor.

pub mod error;
pub mod message;
pub mod protocol;
pub mod provider;
pub mod reasoning;
pub mod session;
pub mod sse;
pub mod state;
pub mod tool;

pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use protocol::{AgentEvent, EventSink, RunAgentInput, RunOutcome};
pub use provider::LlmProvider;
pub use reasoning::{Agent, AgentBuilder, AgentConfig};
pub use session::{Session, SessionId, SessionManager};
pub use state::{SharedState, StateSnapshot};
pub use tool::{Tool, ToolArgs, ToolCall, ToolContext, ToolRegistry, ToolResult, ToolSchema};
