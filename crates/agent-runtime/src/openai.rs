//! OpenAI LLM Provider
//!
//! Implementation of `LlmProvider` over the Chat Completions API. Responses
//! are always streamed; tool call fragments are forwarded as they arrive.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{
        CompletionStream, FinishReason, GenerationOptions, LlmProvider, ModelInfo, ProviderInfo,
        StreamChunk, TokenUsage,
    },
    sse::SseDecoder,
    tool::ToolSchema,
};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI provider configuration
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// Bearer credential
    pub api_key: String,

    /// API root, without trailing slash
    pub base_url: String,

    /// Timeout for non-streaming calls, in seconds
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            timeout_secs: 30,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }
}

/// OpenAI LLM provider
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    /// Create a provider from configuration
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AgentError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url)
    }

    fn convert_messages(messages: &[Message]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "tool",
                };

                let tool_calls = (!m.tool_calls.is_empty()).then(|| {
                    m.tool_calls
                        .iter()
                        .map(|c| OpenAiToolCall {
                            id: c.id.clone(),
                            call_type: "function".into(),
                            function: OpenAiFunctionCall {
                                name: c.name.clone(),
                                arguments: c.arguments.clone(),
                            },
                        })
                        .collect()
                });

                // Assistant tool-call turns may carry no text
                let content = if tool_calls.is_some() && m.content.is_empty() {
                    None
                } else {
                    Some(m.content.clone())
                };

                OpenAiMessage {
                    role: role.into(),
                    content,
                    tool_calls,
                    tool_call_id: m.tool_call_id.clone(),
                }
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolSchema]) -> Vec<OpenAiTool> {
        tools
            .iter()
            .map(|t| OpenAiTool {
                tool_type: "function".into(),
                function: OpenAiFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.to_json_schema(),
                },
            })
            .collect()
    }

    fn build_request(messages: &[Message], tools: &[ToolSchema], options: &GenerationOptions) -> OpenAiRequest {
        let tools = (!tools.is_empty()).then(|| Self::convert_tools(tools));
        OpenAiRequest {
            model: options.model.clone(),
            messages: Self::convert_messages(messages),
            max_completion_tokens: Some(options.max_tokens),
            temperature: options.temperature,
            tool_choice: tools.as_ref().map(|_| "auto".to_owned()),
            tools,
            stream: true,
            stream_options: StreamOptions { include_usage: true },
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        let models = self.list_models().await.unwrap_or_default();

        Ok(ProviderInfo {
            name: "OpenAI".into(),
            models,
            supports_streaming: true,
            supports_tools: true,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        match self.list_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("OpenAI health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        let request = Self::build_request(messages, tools, options);
        tracing::debug!(model = %request.model, messages = request.messages.len(), "Sending chat completion");

        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &body));
        }

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut decoder = SseDecoder::new();
            let mut translator = ChunkTranslator::default();

            while let Some(next) = bytes.next().await {
                let payloads = match next {
                    Ok(chunk) => decoder.push(&chunk),
                    Err(e) => {
                        let _ = tx
                            .send(Err(AgentError::ProviderUnavailable(format!("stream interrupted: {e}"))))
                            .await;
                        return;
                    }
                };
                if !forward(&tx, &mut translator, payloads).await {
                    return;
                }
            }

            if forward(&tx, &mut translator, decoder.finish()).await {
                let _ = tx.send(Ok(translator.finish())).await;
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(self.url("models"))
            .bearer_auth(&self.config.api_key)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .send()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &body));
        }

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| AgentError::Parse(e.to_string()))?;

        Ok(list
            .data
            .into_iter()
            .map(|m| ModelInfo {
                name: m.id.clone(),
                id: m.id,
            })
            .collect())
    }
}

/// Translate decoded payloads and send them on. Returns false when the
/// stream must stop.
async fn forward(
    tx: &mpsc::Sender<Result<StreamChunk>>,
    translator: &mut ChunkTranslator,
    payloads: Vec<String>,
) -> bool {
    for payload in payloads {
        match translator.translate(&payload) {
            Ok(chunks) => {
                for chunk in chunks {
                    if tx.send(Ok(chunk)).await.is_err() {
                        return false;
                    }
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return false;
            }
        }
    }
    true
}

/// Map a failed HTTP status onto the agent error taxonomy
fn error_for_status(status: StatusCode, body: &str) -> AgentError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_owned());
    let message = format!("{status}: {message}");

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited(message),
        s if s.is_server_error() => AgentError::ProviderUnavailable(message),
        _ => AgentError::Provider(message),
    }
}

/// Turns Chat Completions stream payloads into [`StreamChunk`]s.
///
/// The finish reason and usage arrive on separate payloads, so the final
/// [`StreamChunk::Finish`] is only produced by [`ChunkTranslator::finish`].
#[derive(Debug, Default)]
struct ChunkTranslator {
    finish_reason: Option<FinishReason>,
    usage: Option<TokenUsage>,
}

impl ChunkTranslator {
    fn translate(&mut self, payload: &str) -> Result<Vec<StreamChunk>> {
        if payload == "[DONE]" {
            return Ok(Vec::new());
        }

        let chunk: OpenAiStreamChunk =
            serde_json::from_str(payload).map_err(|e| AgentError::Parse(format!("stream payload: {e}")))?;

        if let Some(usage) = chunk.usage {
            self.usage = Some(TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            });
        }

        let mut out = Vec::new();
        for choice in chunk.choices {
            if let Some(delta) = choice.delta.content.filter(|d| !d.is_empty()) {
                out.push(StreamChunk::Text { delta });
            }
            for call in choice.delta.tool_calls.unwrap_or_default() {
                let (name, arguments) = call
                    .function
                    .map(|f| (f.name, f.arguments.unwrap_or_default()))
                    .unwrap_or_default();
                out.push(StreamChunk::ToolCall {
                    index: call.index,
                    id: call.id,
                    name,
                    arguments,
                });
            }
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(match reason.as_str() {
                    "stop" => FinishReason::Stop,
                    "length" => FinishReason::Length,
                    "tool_calls" | "function_call" => FinishReason::ToolUse,
                    "content_filter" => FinishReason::ContentFilter,
                    _ => FinishReason::Error,
                });
            }
        }
        Ok(out)
    }

    fn finish(self) -> StreamChunk {
        StreamChunk::Finish {
            reason: self.finish_reason.unwrap_or(FinishReason::Stop),
            usage: self.usage,
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
    stream: bool,
    stream_options: StreamOptions,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize)]
struct OpenAiFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiStreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAiStreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiStreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamToolCall {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<OpenAiStreamFunction>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::tool::{ParameterSchema, ToolCall};
    use agent_core::provider::CompletionBuilder;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAiProvider {
        OpenAiProvider::new(OpenAiConfig::new("sk-test").with_base_url(server.uri())).unwrap()
    }

    fn sse(payloads: &[&str]) -> String {
        payloads.iter().map(|p| format!("data: {p}\n\n")).collect()
    }

    #[test]
    fn test_config_defaults() {
        let config = OpenAiConfig::new("sk-test").with_base_url("http://localhost:8080/v1/");
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(OpenAiConfig::new("k").base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_message_conversion_keeps_call_pairing() {
        let messages = vec![
            Message::system("You are helpful."),
            Message::user("Weather in Oslo?"),
            Message::assistant_with_calls("", vec![ToolCall::new("c1", "get_weather", r#"{"location":"Oslo"}"#)]),
            Message::tool(r#"{"temperature":20}"#, "c1"),
        ];

        let converted = OpenAiProvider::convert_messages(&messages);
        assert_eq!(converted.len(), 4);
        assert!(converted[2].content.is_none());
        assert_eq!(converted[2].tool_calls.as_ref().unwrap()[0].function.name, "get_weather");
        assert_eq!(converted[3].role, "tool");
        assert_eq!(converted[3].tool_call_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_request_serialization() {
        let tools = vec![ToolSchema::new("get_weather", "Get the weather for a given location.")
            .param(ParameterSchema::string("location", "The location to get the weather for."))];
        let request = OpenAiProvider::build_request(&[Message::user("hi")], &tools, &GenerationOptions::default());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gpt-5.1");
        assert_eq!(json["stream"], true);
        assert_eq!(json["stream_options"]["include_usage"], true);
        assert_eq!(json["tool_choice"], "auto");
        assert_eq!(json["tools"][0]["function"]["parameters"]["required"][0], "location");
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_translator_streams_tool_calls_and_usage() {
        let payloads = [
            r#"{"choices":[{"delta":{"role":"assistant","content":null,"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"get_contacts","arguments":""}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"fetchXml\":"}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"<fetch/>\"}"}}]}}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
            r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
            "[DONE]",
        ];

        let mut translator = ChunkTranslator::default();
        let mut builder = CompletionBuilder::new();
        for payload in payloads {
            for chunk in translator.translate(payload).unwrap() {
                builder.push(&chunk);
            }
        }
        builder.push(&translator.finish());
        let completion = builder.build();

        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].id, "call_1");
        assert_eq!(completion.tool_calls[0].arguments, r#"{"fetchXml":"<fetch/>"}"#);
        assert_eq!(completion.finish_reason, Some(FinishReason::ToolUse));
        assert_eq!(completion.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_translator_rejects_garbage() {
        let mut translator = ChunkTranslator::default();
        assert!(matches!(translator.translate("not json"), Err(AgentError::Parse(_))));
    }

    #[test]
    fn test_status_mapping() {
        let body = r#"{"error":{"message":"Incorrect API key provided"}}"#;
        let auth = error_for_status(StatusCode::UNAUTHORIZED, body);
        assert!(matches!(&auth, AgentError::Auth(m) if m.contains("Incorrect API key")));

        assert!(matches!(error_for_status(StatusCode::TOO_MANY_REQUESTS, ""), AgentError::RateLimited(_)));
        assert!(error_for_status(StatusCode::BAD_GATEWAY, "").is_retryable());
        assert!(matches!(error_for_status(StatusCode::BAD_REQUEST, "bad"), AgentError::Provider(_)));
    }

    #[tokio::test]
    async fn test_complete_streams_tool_call_over_http() {
        let server = MockServer::start().await;
        let body = sse(&[
            r#"{"choices":[{"delta":{"role":"assistant","tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"get_weather","arguments":""}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"location\":\"Oslo\"}"}}]}}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
            r#"{"choices":[],"usage":{"prompt_tokens":12,"completion_tokens":7,"total_tokens":19}}"#,
            "[DONE]",
        ]);
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-5.1",
                "stream": true,
                "stream_options": { "include_usage": true },
                "tool_choice": "auto"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let tools = vec![ToolSchema::new("get_weather", "Get the weather for a given location.")
            .param(ParameterSchema::string("location", "The location to get the weather for."))];
        let completion = provider_for(&server)
            .complete(&[Message::user("Weather in Oslo?")], &tools, &GenerationOptions::default())
            .await
            .unwrap();

        assert_eq!(completion.tool_calls, vec![ToolCall::new("call_1", "get_weather", r#"{"location":"Oslo"}"#)]);
        assert_eq!(completion.finish_reason, Some(FinishReason::ToolUse));
        assert_eq!(completion.usage.unwrap().total_tokens, 19);
    }

    #[tokio::test]
    async fn test_stream_text_without_done_marker() {
        let server = MockServer::start().await;
        let body = format!(
            "{}data: {}",
            sse(&[r#"{"choices":[{"delta":{"content":"Hel"}}]}"#]),
            r#"{"choices":[{"delta":{"content":"lo"},"finish_reason":"stop"}]}"#
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let completion = provider_for(&server)
            .complete(&[Message::user("Hi")], &[], &GenerationOptions::default())
            .await
            .unwrap();

        assert_eq!(completion.content, "Hello");
        assert_eq!(completion.finish_reason, Some(FinishReason::Stop));
        assert!(completion.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_ends_stream_with_parse_error() {
        let server = MockServer::start().await;
        let body = sse(&[r#"{"choices":[{"delta":{"content":"ok"}}]}"#, "{not json"]);
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let result = provider_for(&server)
            .complete(&[Message::user("Hi")], &[], &GenerationOptions::default())
            .await;
        assert!(matches!(result, Err(AgentError::Parse(_))));
    }

    #[tokio::test]
    async fn test_http_status_maps_to_agent_error() {
        let cases = [
            (401, "Incorrect API key provided"),
            (429, "Rate limit reached"),
            (503, "The engine is currently overloaded"),
        ];
        for (status, message) in cases {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/chat/completions"))
                .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "error": { "message": message } })))
                .mount(&server)
                .await;

            let err = provider_for(&server)
                .complete_stream(&[Message::user("Hi")], &[], &GenerationOptions::default())
                .await
                .err()
                .unwrap();

            assert!(err.to_string().contains(message), "{status}: {err}");
            match status {
                401 => assert!(matches!(err, AgentError::Auth(_))),
                429 => assert!(matches!(err, AgentError::RateLimited(_))),
                _ => assert!(matches!(err, AgentError::ProviderUnavailable(_))),
            }
        }
    }

    #[tokio::test]
    async fn test_models_and_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [{ "id": "gpt-5.1", "object": "model", "owned_by": "openai" }]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let models = provider.list_models().await.unwrap();
        assert_eq!(models[0].id, "gpt-5.1");
        assert!(provider.health_check().await.unwrap());

        let down = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&down)
            .await;
        assert!(!provider_for(&down).health_check().await.unwrap());
    }
}
