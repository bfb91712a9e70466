//! Weather Tool
//!
//! Stub reading; no external weather service is called.

use async_trait::async_trait;

use agent_core::{
    Result as CoreResult, Tool, ToolArgs, ToolContext, ToolResult, ToolSchema,
    tool::ParameterSchema,
};

use crate::model::WeatherInfo;

pub struct WeatherTool;

#[async_trait]
impl Tool for WeatherTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "get_weather",
            "Get the weather for a given location. Ensure location is fully spelled out.",
        )
        .param(ParameterSchema::string("location", "The location to get the weather for"))
    }

    async fn execute(&self, args: &ToolArgs, _ctx: &mut ToolContext<'_>) -> CoreResult<ToolResult> {
        let location = args.required_str("location")?;
        tracing::info!(location = %location, "Getting weather");

        ToolResult::json("get_weather", &WeatherInfo::stub())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{SessionId, SharedState, ToolCall};

    #[tokio::test]
    async fn test_weather_ignores_location() {
        let session = SessionId::new();
        let mut state = SharedState::default();
        let mut ctx = ToolContext { session_id: &session, state: &mut state };

        for location in ["Paris", "Ulaanbaatar", ""] {
            let args = ToolCall::new("c", "get_weather", format!(r#"{{"location":"{location}"}}"#))
                .parse_arguments()
                .unwrap();
            let result = WeatherTool.execute(&args, &mut ctx).await.unwrap();
            let info: WeatherInfo = serde_json::from_value(result.data.unwrap()).unwrap();
            assert_eq!(info, WeatherInfo::stub());
        }
    }
}
