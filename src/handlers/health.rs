use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::database::manager;
use crate::AppState;

/// Liveness plus a database ping
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match manager::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "up" })),
        ),
        Err(e) => {
            tracing::warn!("health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "down" })),
            )
        }
    }
}
