//! HTTP surface: a single chat endpoint plus a health probe.
//!
//! The engine does all the work; handlers only translate between JSON and
//! [`ChatRequest`]/[`ChatResponse`]. Every well-formed request gets a 200
//! with a well-formed body, including "I didn't understand" turns.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::engine::{ChatEngine, ChatRequest, ChatResponse};

#[derive(Clone)]
struct AppState {
    engine: Arc<ChatEngine>,
}

pub fn router(engine: Arc<ChatEngine>) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(AppState { engine })
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    Json(state.engine.handle_turn(&request).await)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Binds `addr` and serves the chat API until the process exits.
pub async fn serve(engine: Arc<ChatEngine>, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Listening");
    axum::serve(listener, router(engine)).await?;
    Ok(())
}
