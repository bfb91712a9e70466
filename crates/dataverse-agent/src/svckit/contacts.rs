//! Contacts Tool
//!
//! Forwards a FetchXml query to the CRM and maps the rows to
//! [`ContactInfo`].

use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{
    Result as CoreResult, Tool, ToolArgs, ToolContext, ToolResult, ToolSchema,
    tool::ParameterSchema,
};

use crate::crm::CrmClient;
use crate::model::ContactInfo;

/// Tool for querying contacts
pub struct ContactsTool {
    crm: Arc<dyn CrmClient>,
}

impl ContactsTool {
    pub fn new(crm: Arc<dyn CrmClient>) -> Self {
        Self { crm }
    }
}

#[async_trait]
impl Tool for ContactsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "get_contacts",
            "Gets a list of contacts from Dataverse based on a FetchXml query.",
        )
        .param(ParameterSchema::string(
            "fetchXml",
            "The FetchXml query used to retrieve contacts from Dataverse.",
        ))
    }

    async fn execute(&self, args: &ToolArgs, _ctx: &mut ToolContext<'_>) -> CoreResult<ToolResult> {
        let fetch_xml = args.required_str("fetchXml")?;

        let rows = self.crm.retrieve_multiple(fetch_xml).await.inspect_err(|e| {
            tracing::error!(crm = self.crm.name(), error = %e, "Error retrieving contacts from Dataverse");
        })?;

        let contacts: Vec<ContactInfo> = rows.iter().map(ContactInfo::from_row).collect();
        tracing::info!(count = contacts.len(), "Retrieved contacts");

        ToolResult::json("get_contacts", &contacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::{EntityRow, MockCrmClient};
    use agent_core::{AgentError, SessionId, SharedState, ToolCall};
    use serde_json::{Value, json};

    const QUERY: &str = r#"<fetch><entity name="contact"><attribute name="firstname" /></entity></fetch>"#;

    async fn run(tool: &ContactsTool) -> CoreResult<ToolResult> {
        let session = SessionId::new();
        let mut state = SharedState::default();
        let mut ctx = ToolContext { session_id: &session, state: &mut state };
        let args = ToolCall::new("c", "get_contacts", json!({ "fetchXml": QUERY }).to_string())
            .parse_arguments()
            .unwrap();
        tool.execute(&args, &mut ctx).await
    }

    #[tokio::test]
    async fn test_zero_rows_is_an_empty_list() {
        let tool = ContactsTool::new(Arc::new(MockCrmClient::new()));
        let result = run(&tool).await.unwrap();
        assert_eq!(result.data, Some(json!([])));
        assert_eq!(result.content(), "[]");
    }

    #[tokio::test]
    async fn test_query_is_forwarded_verbatim() {
        let crm = Arc::new(MockCrmClient::with_rows(vec![
            EntityRow::new("contact", None).with_attribute("firstname", json!("Ada")),
            EntityRow::new("contact", None)
                .with_attribute("firstname", json!("Alan"))
                .with_attribute("emailaddress1", json!("alan@example.com"))
                .with_attribute("mobilephone", Value::Null),
        ]));
        let tool = ContactsTool::new(crm.clone());

        let result = run(&tool).await.unwrap();
        let contacts: Vec<ContactInfo> = serde_json::from_value(result.data.unwrap()).unwrap();

        assert_eq!(crm.queries().await, vec![QUERY.to_owned()]);
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].lastname, "");
        assert_eq!(contacts[1].email, "alan@example.com");
        assert_eq!(contacts[1].mobilephone, "");
    }

    #[tokio::test]
    async fn test_crm_failure_is_a_tool_error() {
        let tool = ContactsTool::new(Arc::new(MockCrmClient::failing("unreachable")));
        let err = run(&tool).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolExecution(m) if m.contains("unreachable")));
    }
}
