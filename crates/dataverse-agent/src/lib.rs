//! # dataverse-agent
//!
//! Domain half of the Dataverse chat agent: the CRM client the contact tool
//! queries and the tools the model may call.
//!
//! ## Tools
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┬─────────────────────┐
//! │ get_weather  │ location                     │ fixed stub reading  │
//! │ get_contacts │ fetchXml                     │ CrmClient query     │
//! │ get_proverbs │ -                            │ SharedState read    │
//! │ add_proverbs │ proverbs: [string]           │ SharedState append  │
//! │ set_proverbs │ proverbs: [string]           │ SharedState replace │
//! └──────────────┴──────────────────────────────┴─────────────────────┘
//! ```

pub mod crm;
pub mod error;
pub mod model;
pub mod svckit;

use std::sync::Arc;

use agent_core::{StateSnapshot, ToolRegistry};

pub use crm::{CrmClient, DataverseClient, DataverseConfig, EntityRow, MockCrmClient};
pub use error::{CrmError, Result};
pub use model::{ContactInfo, WeatherInfo};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{
        AddProverbsTool, ContactsTool, GetProverbsTool, SetProverbsTool, WeatherTool,
    };
}

/// Agent display name
pub const AGENT_NAME: &str = "DataverseAgent";

/// Agent description
pub const AGENT_DESCRIPTION: &str =
    "A helpful assistant that helps the user read and write data in Dataverse.";

/// System prompt for the Dataverse agent
pub const DATAVERSE_AGENT_PROMPT: &str = "When calling the get_contacts tool, make sure that the FetchXml always returns firstname, lastname, emailaddress1 and mobilephone.";

/// Proverb every new session starts with
pub const INITIAL_PROVERB: &str = "CopilotKit may be new, but its the best thing since sliced bread.";

/// Shared state seed for new sessions
pub fn initial_state() -> StateSnapshot {
    StateSnapshot {
        proverbs: vec![INITIAL_PROVERB.to_owned()],
    }
}

/// Register every Dataverse agent tool
pub fn register_tools(registry: &mut ToolRegistry, crm: Arc<dyn CrmClient>) -> agent_core::Result<()> {
    registry.register(tools::WeatherTool)?;
    registry.register(tools::ContactsTool::new(crm))?;
    registry.register(tools::GetProverbsTool)?;
    registry.register(tools::AddProverbsTool)?;
    registry.register(tools::SetProverbsTool)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_tools() {
        let mut registry = ToolRegistry::new();
        register_tools(&mut registry, Arc::new(MockCrmClient::new())).unwrap();

        assert_eq!(
            registry.names(),
            vec!["add_proverbs", "get_contacts", "get_proverbs", "get_weather", "set_proverbs"]
        );
        assert!(register_tools(&mut registry, Arc::new(MockCrmClient::new())).is_err());
    }

    #[test]
    fn test_initial_state_has_seed_proverb() {
        assert_eq!(initial_state().proverbs, vec![INITIAL_PROVERB.to_owned()]);
    }
}
