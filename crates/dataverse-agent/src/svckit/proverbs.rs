//! Proverb Tools
//!
//! Read and mutate the proverb list held in the calling session's shared
//! state.

use async_trait::async_trait;

use agent_core::{
    Result as CoreResult, Tool, ToolArgs, ToolContext, ToolResult, ToolSchema,
    tool::ParameterSchema,
};

pub struct GetProverbsTool;

#[async_trait]
impl Tool for GetProverbsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("get_proverbs", "Get the current list of proverbs.")
    }

    async fn execute(&self, _args: &ToolArgs, ctx: &mut ToolContext<'_>) -> CoreResult<ToolResult> {
        let proverbs = ctx.state.proverbs();
        tracing::info!(session = %ctx.session_id, proverbs = ?proverbs, "Getting proverbs");
        ToolResult::json("get_proverbs", &proverbs)
    }
}

pub struct AddProverbsTool;

#[async_trait]
impl Tool for AddProverbsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("add_proverbs", "Add new proverbs to the list.")
            .param(ParameterSchema::string_list("proverbs", "The proverbs to add"))
            .mutating()
    }

    async fn execute(&self, args: &ToolArgs, ctx: &mut ToolContext<'_>) -> CoreResult<ToolResult> {
        let proverbs = args.string_list("proverbs")?;
        tracing::info!(session = %ctx.session_id, proverbs = ?proverbs, "Adding proverbs");

        let added = proverbs.len();
        ctx.state.add_proverbs(proverbs);
        Ok(ToolResult::success("add_proverbs", format!("Added {added} proverbs")))
    }
}

pub struct SetProverbsTool;

#[async_trait]
impl Tool for SetProverbsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("set_proverbs", "Replace the entire list of proverbs.")
            .param(ParameterSchema::string_list("proverbs", "The new list of proverbs"))
            .mutating()
    }

    async fn execute(&self, args: &ToolArgs, ctx: &mut ToolContext<'_>) -> CoreResult<ToolResult> {
        let proverbs = args.string_list("proverbs")?;
        tracing::info!(session = %ctx.session_id, proverbs = ?proverbs, "Setting proverbs");

        let count = proverbs.len();
        ctx.state.set_proverbs(proverbs);
        Ok(ToolResult::success("set_proverbs", format!("Proverb list now has {count} entries")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{SessionId, SharedState, ToolCall, ToolRegistry};
    use serde_json::json;

    struct Harness {
        registry: ToolRegistry,
        session: SessionId,
        state: SharedState,
    }

    impl Harness {
        fn new() -> Self {
            let mut registry = ToolRegistry::new();
            registry.register(GetProverbsTool).unwrap();
            registry.register(AddProverbsTool).unwrap();
            registry.register(SetProverbsTool).unwrap();
            Self {
                registry,
                session: SessionId::new(),
                state: SharedState::default(),
            }
        }

        async fn call(&mut self, name: &str, args: serde_json::Value) -> ToolResult {
            let mut ctx = ToolContext {
                session_id: &self.session,
                state: &mut self.state,
            };
            self.registry
                .execute(&ToolCall::new("c", name, args.to_string()), &mut ctx)
                .await
                .unwrap()
        }

        async fn proverbs(&mut self) -> serde_json::Value {
            self.call("get_proverbs", json!({})).await.data.unwrap()
        }
    }

    #[tokio::test]
    async fn test_add_then_get() {
        let mut h = Harness::new();
        h.call("add_proverbs", json!({ "proverbs": ["a", "b"] })).await;
        h.call("add_proverbs", json!({ "proverbs": ["c"] })).await;
        assert_eq!(h.proverbs().await, json!(["a", "b", "c"]));
    }

    #[tokio::test]
    async fn test_set_then_add() {
        let mut h = Harness::new();
        h.call("add_proverbs", json!({ "proverbs": ["old"] })).await;
        h.call("set_proverbs", json!({ "proverbs": ["x"] })).await;
        h.call("add_proverbs", json!({ "proverbs": ["y", "z"] })).await;
        assert_eq!(h.proverbs().await, json!(["x", "y", "z"]));
    }

    #[tokio::test]
    async fn test_set_then_get_returns_exactly_the_list() {
        let mut h = Harness::new();
        h.call("set_proverbs", json!({ "proverbs": ["dup", "dup", ""] })).await;
        assert_eq!(h.proverbs().await, json!(["dup", "dup", ""]));

        h.call("set_proverbs", json!({ "proverbs": [] })).await;
        assert_eq!(h.proverbs().await, json!([]));
    }

    #[tokio::test]
    async fn test_non_string_items_are_rejected() {
        let mut h = Harness::new();
        let mut ctx = ToolContext {
            session_id: &h.session,
            state: &mut h.state,
        };
        let result = h
            .registry
            .execute(&ToolCall::new("c", "add_proverbs", r#"{"proverbs":[1]}"#), &mut ctx)
            .await;
        assert!(result.is_err());
        assert!(h.state.proverbs().is_empty());
    }
}
