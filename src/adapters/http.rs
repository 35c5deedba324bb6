//! HTTP JSON API for the inference service

use crate::adapters::storage::LocalStorage;
use crate::core::service::{ArtifactPaths, ArtifactSummary, InferenceService};
use crate::core::{ClassificationResult, Feature};
use crate::domain::model::FeatureInfo;
use crate::utils::error::{ErrorCategory, InferenceError, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

type FieldMap = HashMap<String, serde_json::Value>;

/// Application state shared across handlers
pub struct AppState {
    pub service: Arc<InferenceService>,
    pub storage: LocalStorage,
    /// 重新載入時使用的路徑
    pub paths: ArtifactPaths,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: Arc<InferenceService>, storage: LocalStorage, paths: ArtifactPaths) -> Self {
        Self {
            service,
            storage,
            paths,
            start_time: Instant::now(),
        }
    }
}

type AppStateArc = Arc<AppState>;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub category: &'static str,
}

impl From<&InferenceError> for ErrorBody {
    fn from(e: &InferenceError) -> Self {
        Self {
            error: e.to_string(),
            category: e.category().as_str(),
        }
    }
}

pub struct ApiError(InferenceError);

impl From<InferenceError> for ApiError {
    fn from(e: InferenceError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.category() {
            ErrorCategory::InvalidInput => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCategory::Load => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCategory::Capability => StatusCode::NOT_IMPLEMENTED,
            ErrorCategory::Decode | ErrorCategory::Config | ErrorCategory::System => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(ErrorBody::from(&self.0))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
    pub artifacts: ArtifactSummary,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BatchItem {
    Ok(ClassificationResult),
    Err(ErrorBody),
}

pub fn router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/features", get(features))
        .route("/v1/classify", post(classify))
        .route("/v1/classify/batch", post(classify_batch))
        .route("/v1/reload", post(reload))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until ctrl-c
pub async fn run(state: AppState, addr: SocketAddr, request_timeout: Duration) -> Result<()> {
    let app = router(Arc::new(state), request_timeout);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🛰️ Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn health(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_seconds: state.start_time.elapsed().as_secs(),
        artifacts: state.service.snapshot().summary(),
    })
}

async fn features() -> Json<Vec<FeatureInfo>> {
    Json(Feature::catalogue())
}

async fn classify(
    State(state): State<AppStateArc>,
    Json(fields): Json<FieldMap>,
) -> std::result::Result<Json<ClassificationResult>, ApiError> {
    match state.service.classify_fields(&fields) {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            warn!("Classification failed: {}", e);
            Err(e.into())
        }
    }
}

async fn classify_batch(
    State(state): State<AppStateArc>,
    Json(items): Json<Vec<FieldMap>>,
) -> Json<Vec<BatchItem>> {
    let results = state
        .service
        .classify_batch(&items)
        .into_iter()
        .map(|outcome| match outcome {
            Ok(result) => BatchItem::Ok(result),
            Err(e) => BatchItem::Err(ErrorBody::from(&e)),
        })
        .collect();
    Json(results)
}

async fn reload(
    State(state): State<AppStateArc>,
) -> std::result::Result<Json<ArtifactSummary>, ApiError> {
    info!("🔄 Reload requested");
    let artifacts = state
        .service
        .reload(
            &state.storage,
            &state.paths.model_path,
            &state.paths.encoder_path,
        )
        .await?;
    Ok(Json(artifacts.summary()))
}
