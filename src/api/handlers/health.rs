use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::AppState;

/// GET /health — liveness plus a round-trip check against the store.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let started = Instant::now();
    let db_ok = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();
    let db_latency_ms = started.elapsed().as_millis() as u64;

    if db_ok {
        (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "dbLatencyMs": db_latency_ms })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "db": "unreachable" })),
        )
    }
}
