use crate::api::AppState;
use crate::error::Result;
use crate::ml::{FeatureVector, ModelMetadata};
use crate::models::{Diagnosis, RawInput};
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use validator::Validate;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Readiness: the server only starts once artifacts are loaded, so this
/// reports what is being served
pub async fn readiness_check(State(state): State<AppState>) -> Result<Json<ReadinessResponse>> {
    let artifacts = state.service.artifacts();
    Ok(Json(ReadinessResponse {
        status: "ready".to_string(),
        model: artifacts.metadata().name.clone(),
        n_features: artifacts.schema().len(),
        n_classes: artifacts.label_encoder().len(),
    }))
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub model: String,
    pub n_features: usize,
    pub n_classes: usize,
}

/// Run a diagnosis for one patient record
pub async fn create_diagnosis(
    State(state): State<AppState>,
    Json(request): Json<RawInput>,
) -> Result<(StatusCode, Json<DiagnosisResponse>)> {
    request.validate()?;

    let diagnosis = state.service.diagnose(&request)?;

    Ok((
        StatusCode::CREATED,
        Json(DiagnosisResponse {
            confidence_percent: format!("{:.2}%", diagnosis.confidence * 100.0),
            bmi: request.bmi(),
            diagnosis,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct DiagnosisResponse {
    #[serde(flatten)]
    pub diagnosis: Diagnosis,
    pub confidence_percent: String,
    pub bmi: f64,
}

/// Return the encoded feature vector without running the classifier
pub async fn encode_features(
    State(state): State<AppState>,
    Json(request): Json<RawInput>,
) -> Result<Json<FeaturesResponse>> {
    request.validate()?;

    let features = state.service.encode(&request);
    Ok(Json(FeaturesResponse {
        recognized_transport: request.transport().is_some(),
        features,
    }))
}

#[derive(Debug, Serialize)]
pub struct FeaturesResponse {
    pub features: FeatureVector,
    pub recognized_transport: bool,
}

/// Describe the loaded model
pub async fn model_info(State(state): State<AppState>) -> Result<Json<ModelInfoResponse>> {
    let artifacts = state.service.artifacts();
    Ok(Json(ModelInfoResponse {
        metadata: artifacts.metadata().clone(),
        feature_columns: artifacts.feature_columns().to_vec(),
        classes: artifacts.label_encoder().classes().to_vec(),
    }))
}

#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    pub metadata: ModelMetadata,
    pub feature_columns: Vec<String>,
    pub classes: Vec<String>,
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics() -> (StatusCode, String) {
    let metrics = crate::metrics::gather_metrics();
    (StatusCode::OK, metrics)
}
