use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use trafficmedic::api::{self, state::AppState};
use trafficmedic::config::AppConfig;
use trafficmedic::system::FixedSampler;

const MIB: f64 = 1024.0 * 1024.0;

fn app_state() -> AppState {
    let mut rates = vec![MIB; 14];
    rates.insert(6, 15.0 * MIB);
    AppState::with_sampler(&AppConfig::default(), Arc::new(FixedSampler::new(rates)))
}

async fn call(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = api::router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_ok() {
    let state = app_state();
    let (status, body) = call(&state, "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn series_starts_with_demo_data() {
    let state = app_state();
    let (status, body) = call(&state, "GET", "/api/v1/series", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 23);
    assert!(body["data"]["text"].as_str().unwrap().starts_with("25000, 30000"));
}

#[tokio::test]
async fn analysis_round_trip() {
    let state = app_state();

    let (_, latest) = call(&state, "GET", "/api/v1/analysis/latest", None).await;
    assert!(latest["data"].is_null());

    let (status, body) = call(&state, "POST", "/api/v1/analysis", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["rule_set"], "raw_counts");
    let indices: Vec<u64> = body["data"]["anomalies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["index"].as_u64().unwrap())
        .collect();
    assert!(indices.contains(&13));
    assert!(indices.contains(&18));

    let (_, latest) = call(&state, "GET", "/api/v1/analysis/latest", None).await;
    assert_eq!(latest["data"]["id"], body["data"]["id"]);
}

#[tokio::test]
async fn bad_edit_keeps_previous_series() {
    let state = app_state();

    let (status, body) = call(
        &state,
        "PUT",
        "/api/v1/series",
        Some(json!({ "text": "100, 200, oops" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "invalid_input");

    let (_, series) = call(&state, "GET", "/api/v1/series", None).await;
    assert_eq!(series["meta"]["total"], 23);

    let (status, _) = call(&state, "PUT", "/api/v1/series", Some(json!({ "text": " , " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn edited_series_is_analyzed() {
    let state = app_state();
    let (status, _) = call(
        &state,
        "PUT",
        "/api/v1/series",
        Some(json!({ "text": "5, 6, nan, 7" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &state,
        "POST",
        "/api/v1/analysis",
        Some(json!({ "context": "streaming" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"]["state"], "insufficient_data");
    assert_eq!(body["data"]["status"]["have"], 3);
    // the gap is serialized as null, not dropped
    assert!(body["data"]["series"][2].is_null());
}

#[tokio::test]
async fn request_overrides_are_validated() {
    let state = app_state();
    let (status, _) = call(
        &state,
        "POST",
        "/api/v1/analysis",
        Some(json!({ "contamination": 4.0 })),
    )
    .await;
    assert!(status.is_client_error());

    let (status, body) = call(
        &state,
        "POST",
        "/api/v1/analysis",
        Some(json!({ "contamination": 0.1, "random_seed": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["anomalies"].as_array().unwrap().len() <= 3);
}

#[tokio::test]
async fn oversized_model_is_rejected() {
    let state = app_state();
    for body in [
        json!({ "trees": 4_611_686_018_427_387_903u64 }),
        json!({ "trees": 0 }),
        json!({ "max_samples": 0 }),
    ] {
        let (status, reply) = call(&state, "POST", "/api/v1/analysis", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply["error"]["kind"], "bad_request");
    }

    let (status, _) = call(
        &state,
        "POST",
        "/api/v1/monitor",
        Some(json!({ "samples": 5, "trees": 100_000_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, latest) = call(&state, "GET", "/api/v1/analysis/latest", None).await;
    assert!(latest["data"].is_null());
}

#[tokio::test]
async fn monitor_window_is_capped() {
    let state = app_state();
    let (status, body) = call(
        &state,
        "POST",
        "/api/v1/monitor",
        Some(json!({ "samples": 2, "interval_ms": 3_600_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "bad_request");
}

#[tokio::test]
async fn monitor_flags_rate_spike() {
    let state = app_state();
    let (status, body) = call(
        &state,
        "POST",
        "/api/v1/monitor",
        Some(json!({ "samples": 15, "interval_ms": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["rule_set"], "rate_bps");
    let anomalies = body["data"]["anomalies"].as_array().unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0]["index"], 6);
    assert_eq!(anomalies[0]["suggestion"]["category"], "very_high_rate");

    let (status, _) = call(&state, "POST", "/api/v1/monitor", Some(json!({ "samples": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reset_restores_demo_and_clears_results() {
    let state = app_state();
    call(&state, "PUT", "/api/v1/series", Some(json!({ "text": "1, 2, 3" }))).await;
    call(&state, "POST", "/api/v1/analysis", Some(json!({}))).await;

    let (status, _) = call(&state, "DELETE", "/api/v1/session", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, series) = call(&state, "GET", "/api/v1/series", None).await;
    assert_eq!(series["meta"]["total"], 23);
    let (_, latest) = call(&state, "GET", "/api/v1/analysis/latest", None).await;
    assert!(latest["data"].is_null());
}

#[tokio::test]
async fn unknown_route_is_404() {
    let state = app_state();
    let (status, _) = call(&state, "GET", "/api/v2/nothing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
