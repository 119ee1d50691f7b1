// handlers/public/system.rs - GET / and GET /health

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use tracing::error;

use crate::config;
use crate::database::DatabaseManager;
use crate::state::AppState;

/// GET / - welcome message with pointers to health and the route map
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "message": format!("Welcome to {}", config::config().app_name),
        "version": version,
        "health": "/health",
        "docs": {
            "register": "POST /register (public)",
            "login": "POST /login (public - token acquisition)",
            "me": "GET, DELETE /me (protected)",
            "notes": "GET, POST /notes; GET, PUT, DELETE /notes/:id (protected)",
            "tags": "GET /tags (protected)",
        }
    }))
}

/// GET /health - 200 when the database answers, 503 otherwise
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match DatabaseManager::health_check(&state.db).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "ok"
            })),
        ),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "database": "unavailable"
                })),
            )
        }
    }
}
