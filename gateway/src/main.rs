mod api;

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// Internal imports
use crate::api::{ApiError, ChatRequest, DemoRequest};
use riskflow_core::config::Settings;
use riskflow_core::llm::Gateway;
use riskflow_core::registry::Registry;
use riskflow_core::rpc::RpcResponse;
use riskflow_core::runtime::Runtime;
use riskflow_core::task::Run;
use riskflow_core::Orchestrator;

// Application State: the orchestrator bundles registry, gateway and runtime
#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging Setup
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    info!("Risk Gateway Initializing...");

    // 2. Configuration
    let settings = Settings::from_env().context("Failed to read gateway settings")?;

    // 3. Load The Registry
    // Loaded once and shared read-only with every request.
    let registry = match &settings.registry_path {
        Some(path) => Registry::load(path).await.context("Failed to load tool registry")?,
        None => Registry::builtin(),
    };
    info!("Loaded {} tools.", registry.len());

    // 4. Pick the backend
    let gateway = Gateway::for_endpoint(&settings.llm_endpoint, settings.llm_timeout)
        .context("Failed to initialize backend gateway")?;
    if settings.uses_mock_backend() {
        warn!("LLM_ENDPOINT not set, answering from the mock backend");
    } else {
        info!("Backend endpoint: {} (timeout {:?})", settings.llm_endpoint, settings.llm_timeout);
    }

    // 5. Bundle State
    let state = AppState {
        orchestrator: Arc::new(Orchestrator::new(Arc::new(registry), gateway, Runtime::default())),
    };

    // 6. Define Routes
    let cors = cors_layer(&settings.cors_origin)?;
    let app = router(state).layer(cors).layer(TraceLayer::new_for_http());

    // 7. Start Server
    let listener = TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind_addr))?;
    info!("Gateway listening on {}...", settings.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/chat", post(chat))
        .route("/runs/demo", post(run_demo))
        .with_state(state)
}

fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let origin = HeaderValue::from_str(origin).with_context(|| format!("Invalid CORS_ORIGIN '{}'", origin))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true))
}

// --- HANDLERS ---

async fn health_check() -> &'static str {
    "Risk Gateway: Operational"
}

// Free text in, merged JSON-RPC response out
async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<RpcResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    info!("Chat request: {}", payload.request);

    let outcome = state.orchestrator.orchestrate_chat(&payload.request).await?;
    info!("Tools detected: {:?}", outcome.tools_detected);
    Ok(Json(outcome.envelope))
}

async fn run_demo(
    State(state): State<AppState>,
    payload: Result<Json<DemoRequest>, JsonRejection>,
) -> Result<Json<Run>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let run = state.orchestrator.build_and_run_demo(&payload.input).await?;
    info!("Demo run {} complete", run.id);
    Ok(Json(run))
}
