//! Dataverse agent HTTP server
//!
//! Axum host for the agent: one SSE endpoint for agent runs, a health
//! check, and the WASM frontend served from the static directory.

mod config;
mod handlers;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{AgentBuilder, LlmProvider, ToolRegistry};
use agent_runtime::{OpenAiConfig, OpenAiProvider};
use dataverse_agent::{
    AGENT_DESCRIPTION, AGENT_NAME, CrmClient, DATAVERSE_AGENT_PROMPT, DataverseClient,
    DataverseConfig, initial_state, register_tools,
};

use crate::config::AppConfig;
use crate::handlers::{health_check, run_agent};
use crate::state::AppState;

/// How often pending calls and idle sessions are swept
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().inspect_err(|e| tracing::error!("{e}"))?;
    tracing::debug!(?config, "Configuration loaded");

    // LLM provider
    let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(
        OpenAiConfig::new(&config.openai_api_key).with_base_url(&config.openai_base_url),
    )?);

    match provider.health_check().await {
        Ok(true) => tracing::info!(model = %config.openai_model, "✓ Connected to OpenAI"),
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ OpenAI not reachable - runs will fail until it is");
        }
    }

    // Dataverse
    let mut dataverse = DataverseConfig::new(
        &config.dataverse_url,
        &config.dataverse_client_id,
        &config.dataverse_secret,
    );
    if let Some(authority) = &config.dataverse_authority {
        dataverse = dataverse.with_authority(authority);
    }
    let crm: Arc<dyn CrmClient> = Arc::new(DataverseClient::new(dataverse)?);

    if crm.health_check().await {
        tracing::info!(url = %config.dataverse_url, "✓ Connected to Dataverse");
    } else {
        tracing::warn!(url = %config.dataverse_url, "⚠ Dataverse not reachable - get_contacts will fail");
    }

    // Tools
    let mut tools = ToolRegistry::new();
    register_tools(&mut tools, crm.clone())?;

    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    let agent = AgentBuilder::new()
        .provider(provider.clone())
        .tools(tools)
        .name(AGENT_NAME)
        .description(AGENT_DESCRIPTION)
        .instructions(DATAVERSE_AGENT_PROMPT)
        .model(&config.openai_model)
        .max_iterations(config.max_iterations)
        .initial_state(initial_state())
        .build()?;

    let state = AppState::new(agent, provider, crm);
    spawn_sweeper(&state, &config);

    let app = router(state, &config.static_dir);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 {} running on http://{}", AGENT_NAME, config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  POST /        - Agent run (SSE)");
    tracing::info!("  GET  /health  - Health check");
    tracing::info!("  GET  /*       - Frontend from {}", config.static_dir);
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the HTTP router
pub fn router(state: AppState, static_dir: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", post(run_agent).get_service(ServeDir::new(static_dir)))
        .route("/health", get(health_check))
        .fallback_service(ServeDir::new(static_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Expire unanswered frontend calls and drop idle sessions in the background
fn spawn_sweeper(state: &AppState, config: &AppConfig) {
    let sessions = state.sessions.clone();
    let idle_ttl = to_chrono(config.session_idle);
    let pending_timeout = to_chrono(config.hitl_timeout);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let report = sessions.sweep(idle_ttl, pending_timeout).await;
            if report.expired_calls > 0 || report.removed_sessions > 0 {
                tracing::debug!(?report, "Session sweep");
            }
        }
    });
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
