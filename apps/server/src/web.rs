use anyhow::{Context, Result};
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::{Arc, RwLock};

use greenhouse_control::{GreenhouseConfig, GreenhouseStatus};

// Shared state between the control loop and the web server
#[derive(Clone)]
pub struct WebState {
    pub status: Arc<RwLock<Option<GreenhouseStatus>>>,
    pub config: Arc<GreenhouseConfig>,
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/config", get(get_config))
        .with_state(state)
}

pub async fn create_web_server(bind_addr: String, state: WebState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding web server {}", bind_addr))?;
    tracing::info!(%bind_addr, "web server listening");
    axum::serve(listener, router(state))
        .await
        .context("web server")
}

async fn get_status(
    State(state): State<WebState>,
) -> Result<Json<GreenhouseStatus>, StatusCode> {
    let status = state
        .status
        .read()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();
    // Nothing to show until the first tick has run.
    status.map(Json).ok_or(StatusCode::SERVICE_UNAVAILABLE)
}

async fn get_config(State(state): State<WebState>) -> Json<GreenhouseConfig> {
    Json((*state.config).clone())
}
