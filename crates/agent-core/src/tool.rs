//! Tool System
//!
//! Extensible tool framework for agent capabilities.
//! Tools are registered once at startup and dispatched by name from the
//! turn loop. Every invocation receives the calling session's
//! [`ToolContext`], which is the only way a handler can reach shared state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::session::SessionId;
use crate::state::SharedState;

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier, pairs the request with its result
    pub id: String,

    /// Tool identifier
    pub name: String,

    /// Raw JSON arguments exactly as the model produced them
    #[serde(default)]
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the raw arguments into an object.
    ///
    /// An empty string is treated as `{}`; anything that is not a JSON
    /// object is a validation error.
    pub fn parse_arguments(&self) -> Result<ToolArgs> {
        let raw = self.arguments.trim();
        if raw.is_empty() {
            return Ok(ToolArgs::default());
        }

        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(ToolArgs(map)),
            Ok(other) => Err(AgentError::ToolValidation(format!(
                "Arguments must be a JSON object, got {}",
                json_type_name(&other)
            ))),
            Err(e) => Err(AgentError::ToolValidation(format!("Malformed arguments: {e}"))),
        }
    }
}

/// Parsed tool arguments
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Required string argument
    pub fn required_str(&self, name: &str) -> Result<&str> {
        self.0
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ToolValidation(format!("Missing string parameter: {name}")))
    }

    /// Required list-of-strings argument
    pub fn string_list(&self, name: &str) -> Result<Vec<String>> {
        let items = self
            .0
            .get(name)
            .and_then(Value::as_array)
            .ok_or_else(|| AgentError::ToolValidation(format!("Missing array parameter: {name}")))?;

        items
            .iter()
            .map(|v| {
                v.as_str().map(str::to_owned).ok_or_else(|| {
                    AgentError::ToolValidation(format!("Parameter {name} must contain only strings"))
                })
            })
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for ToolArgs {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Result from tool execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Call ID this result answers
    pub id: String,

    /// Whether execution succeeded
    pub success: bool,

    /// Output (success message or error)
    pub output: String,

    /// Structured data (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: String::new(),
            success: true,
            output: output.into(),
            data: None,
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: String::new(),
            success: false,
            output: error.into(),
            data: None,
        }
    }

    /// Successful result whose payload is a serializable value
    pub fn json<T: Serialize>(name: impl Into<String>, value: &T) -> Result<Self> {
        let data = serde_json::to_value(value)?;
        Ok(Self::success(name, data.to_string()).with_data(data))
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Content recorded in the transcript and shown to the LLM
    pub fn content(&self) -> String {
        match (&self.data, self.success) {
            (Some(data), true) => data.to_string(),
            (_, true) => self.output.clone(),
            (_, false) => json!({ "error": self.output }).to_string(),
        }
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, integer, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Item type for `array` parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<String>,

    /// Enum of allowed values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    /// Required string parameter
    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: "string".into(),
            description: description.into(),
            required: true,
            items: None,
            enum_values: None,
        }
    }

    /// Required array-of-strings parameter
    pub fn string_list(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            param_type: "array".into(),
            items: Some("string".into()),
            ..Self::string(name, description)
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn accepts(&self, value: &Value) -> bool {
        if !type_matches(&self.param_type, value) {
            return false;
        }
        if let (Some(item_type), Some(items)) = (&self.items, value.as_array()) {
            if !items.iter().all(|v| type_matches(item_type, v)) {
                return false;
            }
        }
        self.enum_values.as_ref().is_none_or(|allowed| allowed.contains(value))
    }

    fn to_json_schema(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".into(), json!(self.param_type));
        prop.insert("description".into(), json!(self.description));
        if let Some(items) = &self.items {
            prop.insert("items".into(), json!({ "type": items }));
        }
        if let Some(values) = &self.enum_values {
            prop.insert("enum".into(), Value::Array(values.clone()));
        }
        Value::Object(prop)
    }
}

fn type_matches(param_type: &str, value: &Value) -> bool {
    match param_type {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        // Unknown schema types are not enforced
        _ => true,
    }
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions, in declaration order
    pub parameters: Vec<ParameterSchema>,

    /// Whether tool mutates session state
    #[serde(default)]
    pub has_side_effects: bool,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            has_side_effects: false,
        }
    }

    #[must_use]
    pub fn param(mut self, param: ParameterSchema) -> Self {
        self.parameters.push(param);
        self
    }

    #[must_use]
    pub const fn mutating(mut self) -> Self {
        self.has_side_effects = true;
        self
    }

    /// JSON-schema object describing the parameters
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.to_json_schema()))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Build a schema from a client-supplied JSON-schema declaration
    pub fn from_json_schema(name: impl Into<String>, description: impl Into<String>, schema: &Value) -> Self {
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let parameters = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(pname, prop)| ParameterSchema {
                        name: pname.clone(),
                        param_type: prop
                            .get("type")
                            .and_then(Value::as_str)
                            .unwrap_or("string")
                            .to_owned(),
                        description: prop
                            .get("description")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_owned(),
                        required: required.contains(&pname.as_str()),
                        items: prop
                            .pointer("/items/type")
                            .and_then(Value::as_str)
                            .map(str::to_owned),
                        enum_values: prop.get("enum").and_then(Value::as_array).cloned(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            has_side_effects: false,
        }
    }

    /// Check arguments against the declared parameters.
    ///
    /// Rejects missing required parameters, undeclared parameters and values
    /// whose JSON type does not match the declaration.
    pub fn validate_arguments(&self, args: &ToolArgs) -> Result<()> {
        for param in &self.parameters {
            match args.get(&param.name) {
                None if param.required => {
                    return Err(AgentError::ToolValidation(format!(
                        "Missing required parameter: {}",
                        param.name
                    )));
                }
                Some(value) if !param.accepts(value) => {
                    return Err(AgentError::ToolValidation(format!(
                        "Parameter {} must be of type {}, got {}",
                        param.name,
                        param.items.as_ref().map_or_else(
                            || param.param_type.clone(),
                            |item| format!("{}<{item}>", param.param_type)
                        ),
                        json_type_name(value)
                    )));
                }
                _ => {}
            }
        }

        if let Some(unknown) = args
            .keys()
            .find(|k| !self.parameters.iter().any(|p| p.name == *k))
        {
            return Err(AgentError::ToolValidation(format!("Unknown parameter: {unknown}")));
        }

        Ok(())
    }
}

/// Per-invocation context handed to every tool
pub struct ToolContext<'a> {
    /// Session the call belongs to
    pub session_id: &'a SessionId,

    /// The session's shared state
    pub state: &'a mut SharedState,
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with validated arguments
    async fn execute(&self, args: &ToolArgs, ctx: &mut ToolContext<'_>) -> Result<ToolResult>;

    /// Validate arguments before execution
    fn validate(&self, args: &ToolArgs) -> Result<()> {
        self.schema().validate_arguments(args)
    }
}

/// Registry for available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool; names must be unique
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_boxed(Arc::new(tool))
    }

    /// Register a shared tool; names must be unique
    pub fn register_boxed(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.schema().name;
        if self.tools.contains_key(&name) {
            return Err(AgentError::Config(format!("Tool '{name}' is already registered")));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Look up, validate and execute a tool call.
    ///
    /// The handler never runs when lookup, argument parsing or validation
    /// fails.
    pub async fn execute(&self, call: &ToolCall, ctx: &mut ToolContext<'_>) -> Result<ToolResult> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        let args = call.parse_arguments()?;
        tool.validate(&args)?;

        let result = tool.execute(&args, ctx).await?;
        Ok(result.with_id(call.id.clone()))
    }

    /// All tool schemas, ordered by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    /// Tool names, ordered
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema::new("echo", "Echo the text back")
                .param(ParameterSchema::string("text", "Text to echo"))
                .param(ParameterSchema::string_list("tags", "Optional tags").optional())
        }

        async fn execute(&self, args: &ToolArgs, _ctx: &mut ToolContext<'_>) -> Result<ToolResult> {
            Ok(ToolResult::success("echo", args.required_str("text")?))
        }
    }

    fn args(raw: &str) -> ToolArgs {
        ToolCall::new("c", "echo", raw).parse_arguments().unwrap()
    }

    #[test]
    fn test_validation_rejects_missing_unknown_and_mistyped() {
        let schema = EchoTool.schema();

        assert!(schema.validate_arguments(&args(r#"{"text":"hi"}"#)).is_ok());
        assert!(schema.validate_arguments(&args(r#"{"text":"hi","tags":["a"]}"#)).is_ok());

        let missing = schema.validate_arguments(&args("{}")).unwrap_err();
        assert!(missing.to_string().contains("text"));

        let unknown = schema.validate_arguments(&args(r#"{"text":"hi","extra":1}"#)).unwrap_err();
        assert!(unknown.to_string().contains("extra"));

        assert!(schema.validate_arguments(&args(r#"{"text":42}"#)).is_err());
        assert!(schema.validate_arguments(&args(r#"{"text":"hi","tags":[1]}"#)).is_err());
    }

    #[test]
    fn test_malformed_arguments() {
        assert!(ToolCall::new("c", "echo", "{not json").parse_arguments().is_err());
        assert!(ToolCall::new("c", "echo", "[1,2]").parse_arguments().is_err());
        assert!(ToolCall::new("c", "echo", "").parse_arguments().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tool_registry() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("unknown").is_none());
        assert!(matches!(registry.register(EchoTool), Err(AgentError::Config(_))));

        let session = SessionId::new();
        let mut state = SharedState::default();
        let mut ctx = ToolContext { session_id: &session, state: &mut state };

        let ok = registry
            .execute(&ToolCall::new("call-1", "echo", r#"{"text":"hello"}"#), &mut ctx)
            .await
            .unwrap();
        assert!(ok.success);
        assert_eq!(ok.id, "call-1");
        assert_eq!(ok.output, "hello");

        let missing = registry
            .execute(&ToolCall::new("call-2", "nope", "{}"), &mut ctx)
            .await;
        assert!(matches!(missing, Err(AgentError::ToolNotFound(_))));
    }

    #[test]
    fn test_json_schema_declaration_parses() {
        let declared = json!({
            "type": "object",
            "properties": {
                "themeColor": { "type": "string", "description": "The theme color to set." }
            },
            "required": ["themeColor"]
        });
        let schema = ToolSchema::from_json_schema("setThemeColor", "Set the theme color", &declared);

        assert_eq!(schema.parameters.len(), 1);
        assert!(schema.parameters[0].required);
        assert_eq!(schema.to_json_schema()["required"], json!(["themeColor"]));
    }

    #[test]
    fn test_failed_result_content_is_structured() {
        let failed = ToolResult::failure("echo", "boom");
        let content: Value = serde_json::from_str(&failed.content()).unwrap();
        assert_eq!(content["error"], "boom");
    }
}
