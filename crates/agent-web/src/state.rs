//! Client State
//!
//! The transcript model every run event is folded into, plus the purely
//! local UI state frontend tools mutate.

use crate::api::{AgentEvent, InputMessage, Role, RunOutcome, StateSnapshot, ToolCall};

/// Default theme colour
pub const DEFAULT_THEME_COLOR: &str = "#6366f1";

/// Seed proverb shown before the first snapshot arrives
pub const INITIAL_PROVERB: &str = "CopilotKit may be new, but its the best thing since sliced bread.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallStatus {
    /// Arguments still streaming
    InProgress,
    /// Arguments complete, waiting for a result
    Executing,
    Complete,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCallView {
    pub id: String,
    pub name: String,
    pub arguments: String,
    pub result: Option<String>,
    pub status: CallStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub tool_calls: Vec<ToolCallView>,
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn new(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Whether the bubble has anything to show
    pub fn is_visible(&self) -> bool {
        self.role != Role::Tool && (!self.content.is_empty() || !self.tool_calls.is_empty())
    }
}

/// Conversation as the client sees it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transcript {
    pub messages: Vec<ChatMessage>,
    /// Mirror of the session's shared state
    pub state: StateSnapshot,
    /// Set when the mirror was edited locally and must be sent with the next run
    pub state_edited: bool,
    pub running: bool,
    pub error: Option<String>,
    /// Calls the last run handed back to the client
    pub pending: Vec<String>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            state: StateSnapshot {
                proverbs: vec![INITIAL_PROVERB.to_owned()],
            },
            state_edited: false,
            running: false,
            error: None,
            pending: Vec::new(),
        }
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, id: impl Into<String>, text: impl Into<String>) {
        self.messages.push(ChatMessage::new(id, Role::User, text));
    }

    /// Record the client's answer to a pending call
    pub fn push_tool_result(&mut self, id: impl Into<String>, tool_call_id: &str, content: impl Into<String>) {
        let content = content.into();
        if let Some(call) = self.call_mut(tool_call_id) {
            call.result = Some(content.clone());
            call.status = CallStatus::Complete;
        }
        self.pending.retain(|p| p != tool_call_id);

        let mut message = ChatMessage::new(id, Role::Tool, content);
        message.tool_call_id = Some(tool_call_id.to_owned());
        self.messages.push(message);
    }

    /// Give up on calls the user moved past; the host cancels them as well
    pub fn cancel_pending(&mut self) {
        for id in std::mem::take(&mut self.pending) {
            if let Some(call) = self.call_mut(&id) {
                call.result = Some("cancelled".into());
                call.status = CallStatus::Complete;
            }
        }
    }

    /// Remove a proverb from the local mirror
    pub fn remove_proverb(&mut self, index: usize) {
        if index < self.state.proverbs.len() {
            self.state.proverbs.remove(index);
            self.state_edited = true;
        }
    }

    pub fn call(&self, id: &str) -> Option<&ToolCallView> {
        self.messages
            .iter()
            .flat_map(|m| &m.tool_calls)
            .find(|c| c.id == id)
    }

    fn call_mut(&mut self, id: &str) -> Option<&mut ToolCallView> {
        self.messages
            .iter_mut()
            .flat_map(|m| &mut m.tool_calls)
            .find(|c| c.id == id)
    }

    fn message_mut(&mut self, id: &str, role: Role) -> &mut ChatMessage {
        let index = match self.messages.iter().position(|m| m.id == id) {
            Some(index) => index,
            None => {
                self.messages.push(ChatMessage::new(id, role, ""));
                self.messages.len() - 1
            }
        };
        &mut self.messages[index]
    }

    /// Fold one event into the transcript
    pub fn apply(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::RunStarted { .. } => {
                self.running = true;
                self.error = None;
                self.pending.clear();
            }
            AgentEvent::TextMessageStart { message_id, role } => {
                self.message_mut(&message_id, role);
            }
            AgentEvent::TextMessageContent { message_id, delta } => {
                self.message_mut(&message_id, Role::Assistant).content.push_str(&delta);
            }
            AgentEvent::TextMessageEnd { .. } => {}
            AgentEvent::ToolCallStart {
                tool_call_id,
                tool_call_name,
                parent_message_id,
            } => {
                let parent = parent_message_id.unwrap_or_else(|| tool_call_id.clone());
                self.message_mut(&parent, Role::Assistant).tool_calls.push(ToolCallView {
                    id: tool_call_id,
                    name: tool_call_name,
                    arguments: String::new(),
                    result: None,
                    status: CallStatus::InProgress,
                });
            }
            AgentEvent::ToolCallArgs { tool_call_id, delta } => {
                if let Some(call) = self.call_mut(&tool_call_id) {
                    call.arguments.push_str(&delta);
                }
            }
            AgentEvent::ToolCallEnd { tool_call_id } => {
                if let Some(call) = self.call_mut(&tool_call_id) {
                    call.status = CallStatus::Executing;
                }
            }
            AgentEvent::ToolCallResult {
                message_id,
                tool_call_id,
                content,
                ..
            } => {
                if let Some(call) = self.call_mut(&tool_call_id) {
                    call.result = Some(content.clone());
                    call.status = CallStatus::Complete;
                }
                let mut message = ChatMessage::new(message_id, Role::Tool, content);
                message.tool_call_id = Some(tool_call_id);
                self.messages.push(message);
            }
            AgentEvent::StateSnapshot { snapshot } => {
                self.state = snapshot;
                self.state_edited = false;
            }
            AgentEvent::RunFinished { outcome, .. } => {
                self.running = false;
                if let RunOutcome::Interrupt { pending_tool_calls } = outcome {
                    self.pending = pending_tool_calls;
                }
            }
            AgentEvent::RunError { message, .. } => {
                self.running = false;
                self.error = Some(message);
            }
        }
    }

    /// The whole transcript in wire form
    pub fn input_messages(&self) -> Vec<InputMessage> {
        self.messages
            .iter()
            .map(|m| InputMessage {
                id: m.id.clone(),
                role: m.role,
                content: (!m.content.is_empty() || m.tool_calls.is_empty()).then(|| m.content.clone()),
                tool_calls: m
                    .tool_calls
                    .iter()
                    .map(|c| ToolCall {
                        id: c.id.clone(),
                        name: c.name.clone(),
                        arguments: c.arguments.clone(),
                    })
                    .collect(),
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    /// State to send with the next run, if the mirror was edited locally
    pub fn outgoing_state(&self) -> Option<StateSnapshot> {
        self.state_edited.then(|| self.state.clone())
    }
}

/// UI state owned by the client alone
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientLocalState {
    pub theme_color: String,
    /// SVG markup tiled behind the chat
    pub background_pattern: Option<String>,
}

impl Default for ClientLocalState {
    fn default() -> Self {
        Self {
            theme_color: DEFAULT_THEME_COLOR.into(),
            background_pattern: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_round(t: &mut Transcript) {
        for event in [
            AgentEvent::RunStarted { thread_id: "t".into(), run_id: "r1".into() },
            AgentEvent::ToolCallStart {
                tool_call_id: "c1".into(),
                tool_call_name: "get_weather".into(),
                parent_message_id: Some("a1".into()),
            },
            AgentEvent::ToolCallArgs { tool_call_id: "c1".into(), delta: "{\"location\":".into() },
            AgentEvent::ToolCallArgs { tool_call_id: "c1".into(), delta: "\"Oslo\"}".into() },
        ] {
            t.apply(event);
        }
    }

    #[test]
    fn test_tool_call_phases() {
        let mut t = Transcript::new();
        t.push_user("u1", "Weather in Oslo?");
        tool_round(&mut t);

        let call = t.call("c1").unwrap();
        assert_eq!(call.status, CallStatus::InProgress);
        assert_eq!(call.arguments, "{\"location\":\"Oslo\"}");

        t.apply(AgentEvent::ToolCallEnd { tool_call_id: "c1".into() });
        assert_eq!(t.call("c1").unwrap().status, CallStatus::Executing);

        t.apply(AgentEvent::ToolCallResult {
            message_id: "m1".into(),
            tool_call_id: "c1".into(),
            content: "{}".into(),
            success: true,
        });
        assert_eq!(t.call("c1").unwrap().status, CallStatus::Complete);
        assert!(!t.messages.last().unwrap().is_visible());
    }

    #[test]
    fn test_text_streams_into_one_message() {
        let mut t = Transcript::new();
        t.apply(AgentEvent::TextMessageStart { message_id: "a1".into(), role: Role::Assistant });
        t.apply(AgentEvent::TextMessageContent { message_id: "a1".into(), delta: "Hel".into() });
        t.apply(AgentEvent::TextMessageContent { message_id: "a1".into(), delta: "lo".into() });

        assert_eq!(t.messages.len(), 1);
        assert_eq!(t.messages[0].content, "Hello");
    }

    #[test]
    fn test_wire_transcript_pairs_calls_with_results() {
        let mut t = Transcript::new();
        t.push_user("u1", "Weather in Oslo?");
        tool_round(&mut t);
        t.apply(AgentEvent::RunFinished {
            thread_id: "t".into(),
            run_id: "r1".into(),
            outcome: RunOutcome::Interrupt { pending_tool_calls: vec!["c1".into()] },
        });
        assert_eq!(t.pending, vec!["c1".to_owned()]);

        t.push_tool_result("m1", "c1", "");
        assert!(t.pending.is_empty());

        let wire = t.input_messages();
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[1].content, None);
        assert_eq!(wire[1].tool_calls[0].id, "c1");
        assert_eq!(wire[2].tool_call_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_new_message_cancels_pending_locally() {
        let mut t = Transcript::new();
        tool_round(&mut t);
        t.apply(AgentEvent::RunFinished {
            thread_id: "t".into(),
            run_id: "r1".into(),
            outcome: RunOutcome::Interrupt { pending_tool_calls: vec!["c1".into()] },
        });

        t.cancel_pending();
        assert!(t.pending.is_empty());
        assert_eq!(t.call("c1").unwrap().result.as_deref(), Some("cancelled"));
        assert!(t.messages.iter().all(|m| m.role != Role::Tool));
    }

    #[test]
    fn test_local_proverb_edit_is_sent_once() {
        let mut t = Transcript::new();
        assert_eq!(t.outgoing_state(), None);

        t.remove_proverb(0);
        assert_eq!(t.outgoing_state(), Some(StateSnapshot::default()));

        t.apply(AgentEvent::StateSnapshot { snapshot: StateSnapshot::default() });
        assert_eq!(t.outgoing_state(), None);
    }

    #[test]
    fn test_run_error_stops_running() {
        let mut t = Transcript::new();
        t.apply(AgentEvent::RunStarted { thread_id: "t".into(), run_id: "r".into() });
        assert!(t.running);

        t.apply(AgentEvent::RunError { message: "down".into(), code: "PROVIDER_UNAVAILABLE".into() });
        assert!(!t.running);
        assert_eq!(t.error.as_deref(), Some("down"));
    }
}
