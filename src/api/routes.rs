//! API route definitions.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use super::state::AppState;
use crate::analysis::{self, AnalysisContext, AnalysisOptions, AnalysisOverrides, AnalysisResult};
use crate::detect::{parse_series, DetectError};

/// Upper bound on samples per monitoring request.
const MAX_MONITOR_SAMPLES: usize = 3600;
/// Upper bound on the sampling window of one monitoring request.
const MAX_MONITOR_WINDOW_MS: u64 = 10 * 60 * 1000;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/series", get(get_series).put(put_series))
        .route("/analysis", post(run_analysis))
        .route("/analysis/latest", get(latest_analysis))
        .route("/monitor", post(run_monitor))
        .route("/session", delete(reset_session))
}

#[derive(Debug, Error)]
enum ApiError {
    #[error(transparent)]
    InvalidInput(#[from] DetectError),

    #[error("{0}")]
    BadRequest(String),

    #[error("analysis task failed: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            ApiError::InvalidInput(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_input"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        let body = Json(json!({
            "error": { "kind": kind, "message": self.to_string() }
        }));
        (status, body).into_response()
    }
}

fn meta() -> Value {
    json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })
}

fn checked_options(
    overrides: &AnalysisOverrides,
    base: AnalysisOptions,
) -> Result<AnalysisOptions, ApiError> {
    let options = overrides.apply(base);
    options
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(options)
}

fn result_envelope(result: &AnalysisResult) -> Json<Value> {
    let warnings: Vec<String> = result.warnings.iter().map(|w| w.to_string()).collect();
    Json(json!({
        "data": result,
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "anomalies": result.anomalies.len(),
            "model_failed": result.model_failed(),
            "warnings": warnings,
        }
    }))
}

fn series_text(series: &[f64]) -> String {
    series
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": meta()
    }))
}

async fn get_series(State(state): State<AppState>) -> Json<Value> {
    let session = state.session.read().await;
    Json(json!({
        "data": {
            "values": session.series,
            "text": series_text(&session.series),
        },
        "meta": { "total": session.series.len() }
    }))
}

#[derive(Debug, Deserialize)]
struct SeriesUpdate {
    text: String,
}

async fn put_series(
    State(state): State<AppState>,
    Json(update): Json<SeriesUpdate>,
) -> Result<Json<Value>, ApiError> {
    let values = parse_series(&update.text).map_err(|e| {
        warn!(error = %e, "rejected series edit");
        e
    })?;
    if values.is_empty() {
        return Err(ApiError::BadRequest("series is empty".to_string()));
    }

    let mut session = state.session.write().await;
    session.series = values;
    info!(samples = session.series.len(), "series updated");
    Ok(Json(json!({
        "data": {
            "values": session.series,
            "text": series_text(&session.series),
        },
        "meta": { "total": session.series.len() }
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnalyzeRequest {
    context: AnalysisContext,
    #[serde(flatten)]
    overrides: AnalysisOverrides,
}

async fn analyze_off_thread(
    series: Vec<f64>,
    options: AnalysisOptions,
) -> Result<AnalysisResult, ApiError> {
    tokio::task::spawn_blocking(move || analysis::run(&series, &options))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn run_analysis(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<Value>, ApiError> {
    let series = state.session.read().await.series.clone();
    if series.is_empty() {
        return Err(ApiError::BadRequest("no data to analyze".to_string()));
    }
    let options = checked_options(&req.overrides, *state.analysis.options(req.context))?;

    let result = analyze_off_thread(series, options).await?;
    let body = result_envelope(&result);
    state.session.write().await.latest = Some(result);
    Ok(body)
}

async fn latest_analysis(State(state): State<AppState>) -> Json<Value> {
    let session = state.session.read().await;
    match &session.latest {
        Some(result) => result_envelope(result),
        None => Json(json!({ "data": null, "meta": { "message": "no analysis results yet" } })),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MonitorRequest {
    samples: Option<usize>,
    interval_ms: Option<u64>,
    #[serde(flatten)]
    overrides: AnalysisOverrides,
}

async fn run_monitor(
    State(state): State<AppState>,
    Json(req): Json<MonitorRequest>,
) -> Result<Json<Value>, ApiError> {
    let samples = req.samples.unwrap_or(state.monitor.samples);
    let interval_ms = req.interval_ms.unwrap_or(state.monitor.interval_ms);
    if samples == 0 || samples > MAX_MONITOR_SAMPLES {
        return Err(ApiError::BadRequest(format!(
            "samples must be between 1 and {}",
            MAX_MONITOR_SAMPLES
        )));
    }
    if interval_ms == 0 {
        return Err(ApiError::BadRequest("interval_ms must be positive".to_string()));
    }
    if (samples as u64).saturating_mul(interval_ms) > MAX_MONITOR_WINDOW_MS {
        return Err(ApiError::BadRequest(format!(
            "samples x interval_ms must not exceed {} ms",
            MAX_MONITOR_WINDOW_MS
        )));
    }
    let options = checked_options(
        &req.overrides,
        *state.analysis.options(AnalysisContext::Streaming),
    )?;

    info!(samples, interval_ms, "sampling live traffic");
    let series = state
        .sampler
        .collect(samples, Duration::from_millis(interval_ms))
        .await;

    let result = analyze_off_thread(series, options).await?;
    let body = result_envelope(&result);
    state.session.write().await.latest = Some(result);
    Ok(body)
}

async fn reset_session(State(state): State<AppState>) -> Json<Value> {
    state.session.write().await.reset();
    info!("dashboard session reset");
    Json(json!({ "data": { "reset": true }, "meta": meta() }))
}
