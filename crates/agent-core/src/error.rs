//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider rejected or failed the request
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Tool not found in registry or client declarations
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool arguments rejected before the handler ran
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool handler failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Maximum iterations reached in the turn loop
    #[error("Maximum iterations ({0}) reached")]
    MaxIterations(usize),

    /// Malformed provider payload
    #[error("Parse error: {0}")]
    Parse(String),

    /// Session error
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if error is transient
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_) | Self::RateLimited(_)
        )
    }

    /// Stable machine-readable code, sent with `RUN_ERROR`
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Provider(_) => "PROVIDER_ERROR",
            Self::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            Self::ToolNotFound(_) => "TOOL_NOT_FOUND",
            Self::ToolValidation(_) => "TOOL_VALIDATION",
            Self::ToolExecution(_) => "TOOL_EXECUTION",
            Self::MaxIterations(_) => "MAX_ITERATIONS",
            Self::Parse(_) => "PARSE_ERROR",
            Self::Session(_) => "SESSION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::RateLimited(_) => "RATE_LIMITED",
            Self::Auth(_) => "AUTH_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Other(_) => "AGENT_ERROR",
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(_) | Self::Parse(_) => {
                "The AI service encountered an error. Please try again.".into()
            }
            Self::ProviderUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            Self::ToolNotFound(name) => format!("The tool '{name}' is not available."),
            Self::ToolValidation(msg) => format!("Invalid tool input: {msg}"),
            Self::ToolExecution(msg) => format!("Tool error: {msg}"),
            Self::MaxIterations(_) => {
                "The request took too long to process. Please try a simpler query.".into()
            }
            Self::RateLimited(_) => "You've made too many requests. Please wait a moment.".into(),
            Self::Auth(_) => "The AI service rejected our credentials.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_errors_hide_details_from_users() {
        let err = AgentError::Provider("upstream 500: secret internals".into());
        assert!(!err.user_message().contains("secret"));
        assert_eq!(err.code(), "PROVIDER_ERROR");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AgentError::RateLimited("slow down".into()).is_retryable());
        assert!(!AgentError::ToolValidation("bad".into()).is_retryable());
    }
}
