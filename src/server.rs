use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State, rejection::JsonRejection},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{ModelInfo, ModelRegistry, PredictionRequest, PredictionResponse},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<ModelRegistry>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    model_status: &'static str,
    classes: Vec<String>,
}

pub fn build_router(config: Arc<AppConfig>, registry: Arc<ModelRegistry>) -> Router {
    let body_limit = config.max_body_bytes;
    let state = AppState { registry, config };

    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/model-info", get(model_info))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let model_status = if state.registry.is_loaded() {
        "loaded"
    } else {
        "not loaded"
    };

    Json(HealthResponse {
        status: "ML service is running",
        model_status,
        classes: state.registry.classes(),
    })
}

async fn predict(
    State(state): State<AppState>,
    request: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ServiceError> {
    if !state.registry.is_loaded() {
        return Err(ServiceError::ModelNotLoaded);
    }

    let Json(request) = request.map_err(|e| ServiceError::BadRequest(e.body_text()))?;
    let image = request.image.ok_or(ServiceError::MissingImage)?;

    let response = state.registry.predict(image).await?;
    info!(
        prediction = %response.prediction,
        confidence = response.confidence,
        "prediction served"
    );
    Ok(Json(response))
}

async fn model_info(State(state): State<AppState>) -> Result<Json<ModelInfo>, ServiceError> {
    Ok(Json(state.registry.model_info()?))
}
