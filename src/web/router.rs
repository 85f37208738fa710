//! Router configuration.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::progress::progress_ws_handler;
use super::AppState;
use crate::VaultError;

/// Query parameters for issuing a handshake code.
#[derive(Debug, Deserialize)]
pub struct HandshakeQuery {
    /// Application name.
    #[serde(default)]
    pub app: String,
    /// Caller-supplied correlation ID.
    #[serde(default)]
    pub id: String,
}

/// Issued handshake code.
#[derive(Debug, Serialize, Deserialize)]
pub struct HandshakeResponse {
    /// One-time code to present on the progress WebSocket.
    pub code: String,
}

/// Create the main router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new().route("/handshake", get(issue_handshake));

    Router::new()
        .nest("/v1", api_routes)
        .route("/ws/progress", get(progress_ws_handler))
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// GET /v1/handshake?app={app}&id={id}
async fn issue_handshake(
    State(state): State<AppState>,
    Query(query): Query<HandshakeQuery>,
) -> Result<Json<HandshakeResponse>, ApiError> {
    if query.app.is_empty() || query.id.is_empty() {
        return Err(VaultError::Validation("app and id are required".to_string()).into());
    }

    let code = state.broker.issue(&query.app, &query.id);
    Ok(Json(HandshakeResponse { code }))
}

/// GET /health
///
/// Answers `OK` once the asset database responds.
async fn health_check(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    state.assets.db().ping().await?;
    Ok("OK")
}
