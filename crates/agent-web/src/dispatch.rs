//! Presentation dispatch
//!
//! Picks a card for each tool call by exact name, and declares the tools
//! whose handlers live in the browser.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::ToolDeclaration;
use crate::state::{CallStatus, ClientLocalState, ToolCallView};

pub const SET_THEME_COLOR: &str = "setThemeColor";
pub const SET_BACKGROUND_PATTERN: &str = "setBackgroundPattern";
pub const GO_TO_MOON: &str = "go_to_moon";

/// Card family for a tool
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Renderer {
    Weather,
    Contacts,
    Moon,
}

impl Renderer {
    /// Unknown tools render nothing
    pub fn for_tool(name: &str) -> Option<Self> {
        match name {
            "get_weather" => Some(Self::Weather),
            "get_contacts" => Some(Self::Contacts),
            GO_TO_MOON => Some(Self::Moon),
            _ => None,
        }
    }

    /// Spinner text while the call runs
    pub const fn pending_label(self) -> &'static str {
        match self {
            Self::Weather => "Retrieving weather...",
            Self::Contacts => "Fetching from Dataverse...",
            Self::Moon => "Preparing launch...",
        }
    }

    /// Whether the user answers this call
    pub const fn needs_confirmation(self) -> bool {
        matches!(self, Self::Moon)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderPhase {
    Pending,
    /// Waiting on the user's answer
    AwaitingResponse,
    Complete(String),
}

impl RenderPhase {
    pub fn of(call: &ToolCallView, renderer: Renderer, pending: &[String]) -> Self {
        match (&call.result, call.status) {
            (Some(result), CallStatus::Complete) => Self::Complete(result.clone()),
            _ if renderer.needs_confirmation() && pending.contains(&call.id) => Self::AwaitingResponse,
            _ => Self::Pending,
        }
    }
}

/// What `get_contacts` output turns into
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContactsView {
    Nothing,
    Single(ContactRow),
    Table(Vec<ContactRow>),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContactRow {
    pub contactid: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub mobilephone: String,
}

impl ContactsView {
    /// Failures and empty results show nothing
    pub fn from_result(result: &str) -> Self {
        let Ok(mut rows) = serde_json::from_str::<Vec<ContactRow>>(result) else {
            return Self::Nothing;
        };
        match rows.len() {
            0 => Self::Nothing,
            1 => Self::Single(rows.remove(0)),
            _ => Self::Table(rows),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReading {
    pub temperature: i32,
    pub conditions: String,
    pub humidity: i32,
    pub wind_speed: i32,
    pub feels_like: i32,
}

impl WeatherReading {
    /// The reading, or the text to show when the call failed
    pub fn from_result(result: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(result).map_err(|_| result.to_owned())?;
        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return Err(error.to_owned());
        }
        serde_json::from_value(value).map_err(|e| format!("Unreadable weather result: {e}"))
    }
}

/// Pull a string argument out of a call's raw arguments
pub fn argument(arguments: &str, name: &str) -> Option<String> {
    serde_json::from_str::<Value>(arguments)
        .ok()?
        .get(name)?
        .as_str()
        .map(str::to_owned)
}

/// Tools offered to the model whose handlers run here
pub fn frontend_declarations() -> Vec<ToolDeclaration> {
    vec![
        ToolDeclaration {
            name: SET_THEME_COLOR.into(),
            description: "Set the theme color of the application".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "themeColor": {
                        "type": "string",
                        "description": "The theme color to set. Make sure to pick nice colors."
                    }
                },
                "required": ["themeColor"]
            }),
        },
        ToolDeclaration {
            name: SET_BACKGROUND_PATTERN.into(),
            description: "Set the background pattern of the application using an SVG string.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "svgPattern": {
                        "type": "string",
                        "description": "The SVG string to use as a background pattern. It should be a valid SVG string."
                    }
                },
                "required": ["svgPattern"]
            }),
        },
        ToolDeclaration {
            name: GO_TO_MOON.into(),
            description: "Go to the moon on request.".into(),
            parameters: json!({ "type": "object", "properties": {} }),
        },
    ]
}

/// A frontend tool call the browser can run without asking the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrontendAction {
    SetThemeColor(String),
    SetBackgroundPattern(String),
}

impl FrontendAction {
    /// `None` for calls that are not automatic frontend tools
    pub fn parse(call: &ToolCallView) -> Option<Self> {
        match call.name.as_str() {
            SET_THEME_COLOR => argument(&call.arguments, "themeColor").map(Self::SetThemeColor),
            SET_BACKGROUND_PATTERN => {
                argument(&call.arguments, "svgPattern").map(Self::SetBackgroundPattern)
            }
            _ => None,
        }
    }

    pub fn apply(self, local: &mut ClientLocalState) {
        match self {
            Self::SetThemeColor(color) => local.theme_color = color,
            Self::SetBackgroundPattern(svg) => local.background_pattern = Some(svg),
        }
    }
}

/// How the browser answers a call the run handed back
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingResolution {
    /// Send this result right away
    Answer(String),
    /// Leave it for the user to answer
    AwaitUser,
}

/// Run an automatic frontend tool, or defer to the user
pub fn resolve_pending(call: &ToolCallView, local: &mut ClientLocalState) -> PendingResolution {
    if Renderer::for_tool(&call.name).is_some_and(Renderer::needs_confirmation) {
        return PendingResolution::AwaitUser;
    }
    match FrontendAction::parse(call) {
        Some(action) => {
            action.apply(local);
            PendingResolution::Answer(String::new())
        }
        None => PendingResolution::Answer(format!("Invalid arguments for {}", call.name)),
    }
}
