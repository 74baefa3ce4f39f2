//! HTTP status and routing surface
//!
//! Thin axum layer over the gateway and memory store for external
//! monitoring and message injection. All state is dependency-injected
//! through [`AppState`]; the router holds no globals.
//!
//! ## Endpoint Map
//!
//! | Route                           | Description                       |
//! |---------------------------------|-----------------------------------|
//! | `GET  /health`                  | Load balancer health probe        |
//! | `GET  /api/v1/gateway/health`   | Aggregated component health       |
//! | `GET  /api/v1/gateway/status`   | Detailed per-component status     |
//! | `POST /api/v1/gateway/route`    | Route a message through the gateway |
//! | `GET  /api/v1/agents/list`      | Registered agent ids              |
//! | `GET  /api/v1/channels/list`    | Registered channel ids            |
//! | `GET  /api/v1/memory/search`    | Search memory entries             |
//! | `POST /api/v1/memory/store`     | Store a memory entry              |
//! | `GET  /api/v1/interactions/recent` | Recent interactions            |

use crate::agents::AgentManager;
use crate::channels::ChannelManager;
use crate::error::Error;
use crate::gateway::Gateway;
use crate::memory::{MemoryStore, NewMemoryEntry};
use axum::{
    extract::{Query, State},
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub agents: Arc<AgentManager>,
    pub channels: Arc<ChannelManager>,
    pub memory: Arc<MemoryStore>,
}

/// Build the complete relaybot HTTP application.
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health_probe))
        .route("/api/v1/gateway/health", get(gateway_health))
        .route("/api/v1/gateway/status", get(gateway_status))
        .route("/api/v1/gateway/route", post(route_message))
        .route("/api/v1/agents/list", get(list_agents))
        .route("/api/v1/channels/list", get(list_channels))
        .route("/api/v1/memory/search", get(search_memory))
        .route("/api/v1/memory/store", post(store_memory))
        .route("/api/v1/interactions/recent", get(recent_interactions))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn error_response(e: &Error) -> (StatusCode, Json<serde_json::Value>) {
    let status = match e {
        Error::NotRunning { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(serde_json::json!({"error": e.to_string()})),
    )
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health_probe() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn gateway_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.gateway.health_check().await)
}

async fn gateway_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "timestamp": Utc::now(),
        "gateway": state.gateway.health_check().await,
        "agents": state.agents.health_check().await,
        "channels": state.channels.health_check().await,
        "memory": state.memory.health_check().await,
    }))
}

#[derive(Deserialize)]
struct RouteRequest {
    source: String,
    destination: String,
    #[serde(default)]
    payload: serde_json::Value,
}

async fn route_message(
    State(state): State<AppState>,
    Json(request): Json<RouteRequest>,
) -> impl IntoResponse {
    match state
        .gateway
        .route_message(&request.source, &request.destination, request.payload)
        .await
    {
        Ok(outcome) => {
            let routed = outcome.is_routed();
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "routed": routed,
                    "result": outcome.into_value(),
                    "timestamp": Utc::now(),
                })),
            )
        }
        Err(e) => error_response(&e),
    }
}

async fn list_agents(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.agents.list().await)
}

async fn list_channels(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.channels.list().await)
}

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
    category: Option<String>,
    limit: Option<usize>,
}

async fn search_memory(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    match state
        .memory
        .search_memory(&params.q, params.category.as_deref(), limit)
        .await
    {
        Ok(entries) => (
            StatusCode::OK,
            Json(serde_json::to_value(entries).unwrap_or_default()),
        ),
        Err(e) => error_response(&e),
    }
}

async fn store_memory(
    State(state): State<AppState>,
    Json(new): Json<NewMemoryEntry>,
) -> impl IntoResponse {
    match state.memory.store_memory(new).await {
        Ok(entry) => (
            StatusCode::CREATED,
            Json(serde_json::to_value(entry).unwrap_or_default()),
        ),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
struct RecentQuery {
    user_id: Option<String>,
    limit: Option<usize>,
}

async fn recent_interactions(
    State(state): State<AppState>,
    Query(params): Query<RecentQuery>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    match state
        .memory
        .get_recent_interactions(params.user_id.as_deref(), limit)
        .await
    {
        Ok(interactions) => (
            StatusCode::OK,
            Json(serde_json::to_value(interactions).unwrap_or_default()),
        ),
        Err(e) => error_response(&e),
    }
}
