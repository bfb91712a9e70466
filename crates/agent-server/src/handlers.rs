//! HTTP Handlers

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio_stream::wrappers::ReceiverStream;

use agent_core::{EventSink, RunAgentInput, RunOutcome, SessionId};

use crate::state::AppState;

/// Events buffered between the turn loop and a slow client
const EVENT_BUFFER: usize = 256;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub llm_connected: bool,
    pub crm_connected: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (llm, crm) = tokio::join!(state.provider.health_check(), state.crm.health_check());

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        llm_connected: llm.unwrap_or(false),
        crm_connected: crm,
    })
}

/// Agent run endpoint.
///
/// The turn runs on its own task while holding the session lock; events are
/// streamed back as SSE. Dropping the response closes the sink, which stops
/// the turn at its next step.
pub async fn run_agent(
    State(state): State<AppState>,
    Json(input): Json<RunAgentInput>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    if input.thread_id.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "threadId must not be empty".into(),
                code: "INVALID_REQUEST".into(),
            }),
        ));
    }

    tracing::info!(
        thread = %input.thread_id,
        run = %input.run_id,
        messages = input.messages.len(),
        tools = input.tools.len(),
        "Run requested"
    );

    let (sink, rx) = EventSink::channel(EVENT_BUFFER);
    let session = state
        .sessions
        .get_or_create(&SessionId::from_string(&input.thread_id))
        .await;

    tokio::spawn(async move {
        let mut session = session.lock().await;
        let run_id = input.run_id.clone();

        match state.agent.run_turn(&mut session, input, &sink).await {
            Ok(RunOutcome::Success) => {
                tracing::info!(session = %session.id, run = %run_id, "Run finished");
            }
            Ok(RunOutcome::Interrupt { pending_tool_calls }) => {
                tracing::info!(
                    session = %session.id,
                    run = %run_id,
                    pending = ?pending_tool_calls,
                    "Run interrupted for client tools"
                );
            }
            // Already reported on the stream and logged by the agent
            Err(_) => {}
        }
    });

    let stream = ReceiverStream::new(rx).map(|event| Event::default().json_data(event));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use agent_core::{
        AgentBuilder, AgentError, AgentEvent, LlmProvider, Message, Result, ToolRegistry,
        ToolSchema,
        provider::{CompletionStream, FinishReason, GenerationOptions, ModelInfo, ProviderInfo, StreamChunk},
    };
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use dataverse_agent::{MockCrmClient, register_tools};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct ScriptedProvider {
        scripts: Mutex<VecDeque<Vec<StreamChunk>>>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn info(&self) -> Result<ProviderInfo> {
            Ok(ProviderInfo {
                name: "scripted".into(),
                models: vec![],
                supports_streaming: true,
                supports_tools: true,
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete_stream(
            &self,
            _messages: &[Message],
            _tools: &[ToolSchema],
            _options: &GenerationOptions,
        ) -> Result<CompletionStream> {
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::ProviderUnavailable("no script".into()))?;
            Ok(futures::stream::iter(script.into_iter().map(Ok)).boxed())
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(vec![])
        }
    }

    fn app(scripts: Vec<Vec<StreamChunk>>) -> axum::Router {
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider {
            scripts: Mutex::new(scripts.into()),
        });
        let crm = Arc::new(MockCrmClient::new());

        let mut tools = ToolRegistry::new();
        register_tools(&mut tools, crm.clone()).unwrap();
        let agent = AgentBuilder::new()
            .provider(provider.clone())
            .tools(tools)
            .build()
            .unwrap();

        crate::router(AppState::new(agent, provider, crm), "static")
    }

    fn run_request(body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn events(response: axum::response::Response) -> Vec<AgentEvent> {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec())
            .unwrap()
            .split("\n\n")
            .filter_map(|frame| frame.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(vec![])
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["llmConnected"], true);
        assert_eq!(body["crmConnected"], true);
    }

    #[tokio::test]
    async fn test_run_streams_tool_call_and_answer() {
        let app = app(vec![
            vec![
                StreamChunk::ToolCall {
                    index: 0,
                    id: Some("call_1".into()),
                    name: Some("get_weather".into()),
                    arguments: r#"{"location":"#.into(),
                },
                StreamChunk::ToolCall {
                    index: 0,
                    id: None,
                    name: None,
                    arguments: r#""Paris"}"#.into(),
                },
                StreamChunk::Finish { reason: FinishReason::ToolUse, usage: None },
            ],
            vec![
                StreamChunk::Text { delta: "It is sunny in Paris.".into() },
                StreamChunk::Finish { reason: FinishReason::Stop, usage: None },
            ],
        ]);

        let input = json!({
            "threadId": "thread-1",
            "runId": "run-1",
            "messages": [{ "id": "u1", "role": "user", "content": "Weather in Paris?" }],
            "tools": []
        });
        let response = app.oneshot(run_request(&input)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");

        let events = events(response).await;
        assert!(matches!(events.first(), Some(AgentEvent::RunStarted { .. })));
        assert!(matches!(
            events.last(),
            Some(AgentEvent::RunFinished { outcome: RunOutcome::Success, .. })
        ));

        let args: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::ToolCallArgs { delta, .. } => Some(delta.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(args.len(), 2);

        let result = events
            .iter()
            .find_map(|e| match e {
                AgentEvent::ToolCallResult { tool_call_id, content, success, .. } if tool_call_id == "call_1" => {
                    Some((content.clone(), *success))
                }
                _ => None,
            })
            .unwrap();
        assert!(result.1);
        assert_eq!(serde_json::from_str::<Value>(&result.0).unwrap()["windSpeed"], 10);
    }

    #[tokio::test]
    async fn test_provider_failure_is_a_run_error() {
        let input = json!({ "threadId": "t", "runId": "r", "messages": [{ "id": "u1", "role": "user", "content": "hi" }] });
        let response = app(vec![]).oneshot(run_request(&input)).await.unwrap();

        let events = events(response).await;
        match events.last() {
            Some(AgentEvent::RunError { code, message }) => {
                assert_eq!(code, "PROVIDER_UNAVAILABLE");
                assert!(!message.contains("no script"));
            }
            other => panic!("expected RUN_ERROR, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_thread_id_is_rejected() {
        let input = json!({ "threadId": " ", "runId": "r" });
        let response = app(vec![]).oneshot(run_request(&input)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let response = app(vec![])
            .oneshot(Request::builder().uri("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
