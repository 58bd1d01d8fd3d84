use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // Auth is handled by an upstream proxy; this service is forensic and
    // read-mostly, so every route is mounted flat.
    let router = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render))
        // Query/ranking service
        .route("/api/wallets", get(handlers::wallets::list))
        .route("/api/wallets/:address", get(handlers::wallets::detail))
        // Event intake (market-data collector)
        .route("/api/events/trades", post(handlers::ingest::trades))
        .route("/api/events/resolutions", post(handlers::ingest::resolutions))
        .route("/api/events/observations", post(handlers::ingest::observations));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
