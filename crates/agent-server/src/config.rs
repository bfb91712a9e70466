//! Server Configuration
//!
//! Read once at startup. Missing credentials are fatal; everything else has
//! a default.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting {key}: set the {env} environment variable")]
    Missing { key: &'static str, env: &'static str },

    #[error("Invalid value {value:?} for {env}: {reason}")]
    Invalid {
        env: &'static str,
        value: String,
        reason: String,
    },
}

/// Typed application settings
#[derive(Clone)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,

    pub dataverse_url: String,
    pub dataverse_client_id: String,
    pub dataverse_secret: String,
    pub dataverse_authority: Option<String>,

    pub bind_addr: String,
    pub static_dir: String,

    /// LLM calls allowed per run
    pub max_iterations: usize,
    /// How long a frontend tool call may wait for the client
    pub hitl_timeout: Duration,
    /// Idle time after which a session is torn down
    pub session_idle: Duration,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_model", &self.openai_model)
            .field("dataverse_url", &self.dataverse_url)
            .field("dataverse_client_id", &self.dataverse_client_id)
            .field("dataverse_authority", &self.dataverse_authority)
            .field("bind_addr", &self.bind_addr)
            .field("static_dir", &self.static_dir)
            .field("max_iterations", &self.max_iterations)
            .field("hitl_timeout", &self.hitl_timeout)
            .field("session_idle", &self.session_idle)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through `lookup`, which maps an environment variable name to its
    /// value
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |env: &str| lookup(env).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        let required = |key: &'static str, env: &'static str| get(env).ok_or(ConfigError::Missing { key, env });
        let or_default = |env: &str, default: &str| get(env).unwrap_or_else(|| default.to_owned());

        Ok(Self {
            openai_api_key: required("OpenAI:ApiKey", "OPENAI_API_KEY")?,
            openai_base_url: or_default("OPENAI_BASE_URL", agent_runtime::openai::DEFAULT_BASE_URL),
            openai_model: or_default("OPENAI_MODEL", "gpt-5.1"),

            dataverse_url: required("Dataverse:Url", "DATAVERSE_URL")?,
            dataverse_client_id: required("Dataverse:ClientId", "DATAVERSE_CLIENT_ID")?,
            dataverse_secret: required("Dataverse:Secret", "DATAVERSE_SECRET")?,
            dataverse_authority: get("DATAVERSE_AUTHORITY"),

            bind_addr: or_default("BIND_ADDR", "0.0.0.0:3000"),
            static_dir: or_default("STATIC_DIR", "static"),

            max_iterations: parse(&get, "AGENT_MAX_ITERATIONS", 10)?,
            hitl_timeout: Duration::from_secs(parse(&get, "HITL_TIMEOUT_SECS", 600)?),
            session_idle: Duration::from_secs(parse(&get, "SESSION_IDLE_SECS", 3600)?),
        })
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, env: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(env) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            env,
            reason: e.to_string(),
            value,
        }),
    }
}
