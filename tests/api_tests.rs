mod common;

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Duration;
use tower::ServiceExt;

use polysleuth::api::router::create_router;
use polysleuth::engine;
use polysleuth::ingestion;
use polysleuth::AppState;

fn metrics_handle() -> metrics_exporter_prometheus::PrometheusHandle {
    static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(polysleuth::metrics::init_metrics)
        .clone()
}

async fn build_test_app() -> Option<(axum::Router, sqlx::PgPool)> {
    let pool = common::try_setup_test_db().await?;

    let state = AppState {
        db: pool.clone(),
        config: common::test_config(),
        metrics_handle: metrics_handle(),
    };

    Some((create_router(state), pool))
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let resp = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let Some((app, _pool)) = build_test_app().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };

    let (status, json) = get_json(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_list_wallets_empty_is_not_an_error() {
    let Some((app, _pool)) = build_test_app().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };

    // No wallet has traded in the last 7 days with these badges.
    let (status, json) =
        get_json(app, "/api/wallets?badges=BIG_BET,LONG_SHOT&timeframe=7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"].as_array().unwrap().len(), 0);
    assert_eq!(json["meta"]["total"], 0);
    assert_eq!(json["meta"]["totalPages"], 0);
}

#[tokio::test]
async fn test_list_wallets_with_badge_filter() {
    let Some((app, pool)) = build_test_app().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let config = common::test_config();
    let t0 = common::base_time();

    // A long-shot winner and an unremarkable wallet.
    ingestion::ingest_trades(
        &pool,
        &[
            common::make_trade_event("t1", "0xLONGSHOT", "m1", 8, 100, t0),
            common::make_trade_event("t2", "0xPLAIN", "m1", 55, 100, t0 + Duration::minutes(5)),
        ],
    )
    .await;
    ingestion::ingest_resolutions(
        &pool,
        &[common::make_resolution_event("m1", "Yes", t0 + Duration::hours(8))],
    )
    .await;
    engine::run_detection(&pool, &config).await.unwrap();

    let (status, json) = get_json(app.clone(), "/api/wallets?badges=LONG_SHOT").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["address"], "0xLONGSHOT");
    assert_eq!(json["meta"]["total"], 1);
    assert_eq!(json["meta"]["totalPages"], 1);

    let badges = data[0]["badges"].as_array().unwrap();
    assert!(badges.iter().any(|b| b["type"] == "LONG_SHOT"));
    assert!(!data[0]["recentTrades"].as_array().unwrap().is_empty());

    // Unfiltered listing sees both wallets.
    let (_, json) = get_json(app, "/api/wallets").await;
    assert_eq!(json["meta"]["total"], 2);
}

#[tokio::test]
async fn test_list_wallets_clamps_limit_and_drops_bad_tokens() {
    let Some((app, _pool)) = build_test_app().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };

    let (status, json) = get_json(
        app,
        "/api/wallets?limit=5000&page=0&badges=NOT_A_BADGE&sort=luck",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["meta"]["limit"], 50);
    assert_eq!(json["meta"]["page"], 1);
    assert_eq!(json["meta"]["filters"]["badges"].as_array().unwrap().len(), 0);
    assert_eq!(json["meta"]["filters"]["sort"], "firstTradeAt");
}

#[tokio::test]
async fn test_wallet_detail_not_found() {
    let Some((app, _pool)) = build_test_app().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };

    let (status, json) = get_json(app, "/api/wallets/0xNOBODY").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_ingest_rejects_invalid_trades() {
    let Some((app, _pool)) = build_test_app().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };

    let t0 = common::base_time();
    let mut bad = common::make_trade_event("bad", "0xW", "m1", 40, 100, t0);
    bad.price = rust_decimal::Decimal::new(150, 2); // 1.50, out of range
    let good = common::make_trade_event("good", "0xW", "m1", 40, 100, t0);

    let body = serde_json::to_string(&vec![bad, good]).unwrap();
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/events/trades")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["accepted"], 1);
    assert_eq!(json["data"]["rejected"], 1);
}
