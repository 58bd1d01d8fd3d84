use axum::extract::State;
use axum::Json;

use crate::ingestion::{self, IngestReport};
use crate::models::{ObservationEvent, ResolutionEvent, TradeEvent};
use crate::AppState;

use super::wallets::ApiResponse;

/// POST /api/events/trades — batch trade intake from the market-data
/// collector. Invalid or conflicting events are rejected per event.
pub async fn trades(
    State(state): State<AppState>,
    Json(events): Json<Vec<TradeEvent>>,
) -> Json<ApiResponse<IngestReport>> {
    let report = ingestion::ingest_trades(&state.db, &events).await;

    Json(ApiResponse {
        success: true,
        data: Some(report),
        error: None,
    })
}

/// POST /api/events/resolutions — market resolution intake.
pub async fn resolutions(
    State(state): State<AppState>,
    Json(events): Json<Vec<ResolutionEvent>>,
) -> Json<ApiResponse<IngestReport>> {
    let report = ingestion::ingest_resolutions(&state.db, &events).await;

    Json(ApiResponse {
        success: true,
        data: Some(report),
        error: None,
    })
}

/// POST /api/events/observations — market price/volume sample intake.
pub async fn observations(
    State(state): State<AppState>,
    Json(events): Json<Vec<ObservationEvent>>,
) -> Json<ApiResponse<IngestReport>> {
    let report = ingestion::ingest_observations(&state.db, &events).await;

    Json(ApiResponse {
        success: true,
        data: Some(report),
        error: None,
    })
}
