//! Application State

use std::sync::Arc;

use agent_core::{Agent, LlmProvider, SessionManager};
use dataverse_agent::CrmClient;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The Dataverse agent; one instance serves every session
    pub agent: Arc<Agent>,

    /// Live sessions keyed by thread id
    pub sessions: Arc<SessionManager>,

    /// LLM provider, kept for health checks
    pub provider: Arc<dyn LlmProvider>,

    /// CRM client, kept for health checks
    pub crm: Arc<dyn CrmClient>,
}

impl AppState {
    pub fn new(agent: Agent, provider: Arc<dyn LlmProvider>, crm: Arc<dyn CrmClient>) -> Self {
        let sessions = SessionManager::new(agent.config().initial_state.clone());
        Self {
            agent: Arc::new(agent),
            sessions: Arc::new(sessions),
            provider,
            crm,
        }
    }
}
