//! Agent Wire Protocol
//!
//! Run requests coming in from the chat client and the ordered event stream
//! going back out. Events are JSON objects tagged by `type`; field names are
//! camelCase on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::message::{Message, Role};
use crate::state::StateSnapshot;
use crate::tool::{ToolCall, ToolSchema};

/// One run request: the client's transcript, its tool declarations and its
/// mirror of shared state
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAgentInput {
    pub thread_id: String,
    pub run_id: String,
    #[serde(default)]
    pub messages: Vec<InputMessage>,
    #[serde(default)]
    pub tools: Vec<ToolDeclaration>,
    #[serde(default)]
    pub state: Option<StateSnapshot>,
}

/// Transcript entry as the client sends it
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputMessage {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl From<InputMessage> for Message {
    fn from(input: InputMessage) -> Self {
        let mut msg = Self::new(input.role, input.content.unwrap_or_default()).with_id(input.id);
        msg.tool_calls = input.tool_calls;
        msg.tool_call_id = input.tool_call_id;
        msg
    }
}

/// A tool the client executes itself, declared so the model can call it
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Value,
}

impl From<&ToolDeclaration> for ToolSchema {
    fn from(decl: &ToolDeclaration) -> Self {
        Self::from_json_schema(&decl.name, &decl.description, &decl.parameters)
    }
}

/// How a run ended
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RunOutcome {
    /// The model produced its final answer
    Success,
    /// The run yielded to the client for these tool calls
    Interrupt { pending_tool_calls: Vec<String> },
}

/// Streamed run event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum AgentEvent {
    RunStarted {
        thread_id: String,
        run_id: String,
    },
    TextMessageStart {
        message_id: String,
        role: Role,
    },
    TextMessageContent {
        message_id: String,
        delta: String,
    },
    TextMessageEnd {
        message_id: String,
    },
    ToolCallStart {
        tool_call_id: String,
        tool_call_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_message_id: Option<String>,
    },
    ToolCallArgs {
        tool_call_id: String,
        delta: String,
    },
    ToolCallEnd {
        tool_call_id: String,
    },
    ToolCallResult {
        message_id: String,
        tool_call_id: String,
        content: String,
        success: bool,
    },
    StateSnapshot {
        snapshot: StateSnapshot,
    },
    RunFinished {
        thread_id: String,
        run_id: String,
        outcome: RunOutcome,
    },
    RunError {
        message: String,
        code: String,
    },
}

/// Outbound half of a run's event stream.
///
/// Emitting never fails: once the receiver is gone events are dropped and
/// [`EventSink::is_closed`] reports it so the turn loop can stop early.
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: mpsc::Sender<AgentEvent>,
}

impl EventSink {
    pub const fn new(tx: mpsc::Sender<AgentEvent>) -> Self {
        Self { tx }
    }

    /// Sink plus its receiving end
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AgentEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    pub async fn emit(&self, event: AgentEvent) {
        if self.tx.send(event).await.is_err() {
            tracing::debug!("Event receiver dropped");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_shape() {
        let event = AgentEvent::ToolCallStart {
            tool_call_id: "call_1".into(),
            tool_call_name: "get_weather".into(),
            parent_message_id: None,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "TOOL_CALL_START", "toolCallId": "call_1", "toolCallName": "get_weather" })
        );

        let finished = AgentEvent::RunFinished {
            thread_id: "t".into(),
            run_id: "r".into(),
            outcome: RunOutcome::Interrupt { pending_tool_calls: vec!["call_2".into()] },
        };
        assert_eq!(
            serde_json::to_value(&finished).unwrap()["outcome"],
            json!({ "type": "interrupt", "pendingToolCalls": ["call_2"] })
        );
    }

    #[test]
    fn test_run_input_parses_client_payload() {
        let input: RunAgentInput = serde_json::from_value(json!({
            "threadId": "thread-1",
            "runId": "run-1",
            "messages": [
                { "id": "m1", "role": "user", "content": "Go to the moon" },
                {
                    "id": "m2", "role": "assistant", "content": null,
                    "toolCalls": [{ "id": "c1", "name": "go_to_moon", "arguments": "{}" }]
                },
                { "id": "m3", "role": "tool", "content": "confirmed", "toolCallId": "c1" }
            ],
            "tools": [{ "name": "go_to_moon", "description": "Go to the moon on request." }],
            "state": { "proverbs": ["a"] }
        }))
        .unwrap();

        assert_eq!(input.messages.len(), 3);
        assert_eq!(input.tools[0].name, "go_to_moon");
        assert_eq!(input.state.unwrap().proverbs, vec!["a".to_owned()]);

        let tool_msg: Message = input.messages[2].clone().into();
        assert_eq!(tool_msg.id, "m3");
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("c1"));
    }
}
