//! HTTP server exposing the analysis core.
//!
//! This module provides an HTTP server that:
//! - Scores a reading against caller-supplied history via POST /api/analyze
//! - Forecasts the next value of a channel via POST /api/predict
//!
//! # Architecture
//!
//! ```text
//! Client ──→ POST /api/analyze ──→ [input validation] ──→ RiskEngine ──→ AnalysisResult
//!        ──→ POST /api/predict ──→ [input validation] ──→ predict_next ──→ {key, prediction}
//! ```
//!
//! The server is stateless: every request carries its own history.

use crate::config::Config;
use crate::core::{predict_next, AnalysisResult, RiskEngine};
use crate::reading::{AnalyzeRequest, Channel, InputError, PredictRequest};
use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono_tz::Tz;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Timezone used to classify readings into slots
    pub timezone: Tz,
}

impl ServerConfig {
    pub fn new(port: u16, timezone: Tz) -> Self {
        Self { port, timezone }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.server_port, config.timezone)
    }
}

/// Shared server state
pub struct ServerState {
    engine: RiskEngine,
}

impl ServerState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            engine: RiskEngine::new(config.timezone),
        }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Forecast response
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub key: Channel,
    pub prediction: Option<f64>,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn invalid_input(e: InputError) -> ApiError {
    tracing::debug!(error = %e, "rejected request");
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: e.to_string(),
            code: Some("INVALID_INPUT".to_string()),
        }),
    )
}

fn server_error(e: impl std::fmt::Display) -> ApiError {
    tracing::error!(error = %e, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Server error".to_string(),
            code: None,
        }),
    )
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/analyze
///
/// Accepts `{data|reading, history, age?, underlyingConditions?}`.
async fn analyze(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let request = AnalyzeRequest::from_value(&body).map_err(invalid_input)?;

    let engine = state.engine;
    let result = tokio::task::spawn_blocking(move || {
        engine.analyze(&request.reading, &request.history, &request.profile)
    })
    .await
    .map_err(server_error)?;

    tracing::debug!(risk = result.risk, alerts = result.alerts.len(), "analysed request");
    Ok(Json(result))
}

/// POST /api/predict
///
/// Accepts `{history, key?, windowSize?}`.
async fn predict(Json(body): Json<serde_json::Value>) -> Result<Json<PredictResponse>, ApiError> {
    let request = PredictRequest::from_value(&body).map_err(invalid_input)?;
    let prediction = predict_next(&request.history, request.channel, request.window_size);

    Ok(Json(PredictResponse {
        key: request.channel,
        prediction,
    }))
}

/// Build the router without binding a socket.
pub fn router(config: &ServerConfig) -> Router {
    let state = Arc::new(ServerState::new(config));

    Router::new()
        .route("/health", get(health))
        .route("/api/analyze", post(analyze))
        .route("/api/predict", post(predict))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = router(&config);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("VitalWatch server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
