//! Service Kit - Agent Tools
//!
//! Domain-specific tools that implement `agent_core::Tool` for the Dataverse
//! agent.

mod contacts;
mod proverbs;
mod weather;

pub use contacts::ContactsTool;
pub use proverbs::{AddProverbsTool, GetProverbsTool, SetProverbsTool};
pub use weather::WeatherTool;
