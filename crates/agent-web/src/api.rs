//! API Client
//!
//! Streams one run of the host's agent protocol as decoded events.

use agent_core::sse::SseDecoder;
use futures::StreamExt;
use serde_json::Value;

pub use agent_core::protocol::{AgentEvent, InputMessage, RunAgentInput, RunOutcome, ToolDeclaration};
pub use agent_core::{Role, StateSnapshot, ToolCall};

/// Decodes run events out of an SSE body as bytes arrive
#[derive(Debug, Default)]
pub struct EventReader {
    decoder: SseDecoder,
}

impl EventReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning the events they completed
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<AgentEvent, String>> {
        self.decoder
            .push(bytes)
            .into_iter()
            .map(|payload| serde_json::from_str(&payload).map_err(|e| format!("Bad event: {e}")))
            .collect()
    }
}

// ============================================================================
// Requests
// ============================================================================

fn endpoint() -> String {
    let origin = web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_else(|| "http://localhost:3000".into());
    format!("{origin}/")
}

/// Run the agent, calling `on_event` for every event in arrival order
pub async fn run_agent(
    input: &RunAgentInput,
    mut on_event: impl FnMut(AgentEvent),
) -> Result<(), String> {
    let response = reqwest::Client::new()
        .post(endpoint())
        .header("accept", "text/event-stream")
        .json(input)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        let data: Value = response.json().await.unwrap_or_default();
        return Err(data["error"].as_str().unwrap_or("Request failed").to_string());
    }

    let mut reader = EventReader::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| e.to_string())?;
        for event in reader.feed(&chunk) {
            on_event(event?);
        }
    }

    Ok(())
}
