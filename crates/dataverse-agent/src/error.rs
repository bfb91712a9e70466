//! Error Types for the Dataverse client

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrmError>;

#[derive(Error, Debug)]
pub enum CrmError {
    #[error("Dataverse authentication failed: {0}")]
    Auth(String),

    #[error("Dataverse API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid query: {0}")]
    Query(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CrmError> for agent_core::AgentError {
    fn from(err: CrmError) -> Self {
        Self::ToolExecution(err.to_string())
    }
}
