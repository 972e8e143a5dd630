use crate::errors::AppError;
use crate::knowledge::KnowledgeReader;
use crate::models::{CompositeRecord, PipelineSummary};
use crate::pipeline::Pipeline;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// The lead pipeline; its collaborator clients are shared by all in-flight runs.
    pub pipeline: Arc<Pipeline>,
    /// Cache-first reader for persisted records.
    pub reader: Arc<KnowledgeReader>,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "leadflow-pipeline",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/v1/leads
///
/// Runs the full pipeline for one lead. The body is the lead's field mapping,
/// e.g. `{"email": "...", "company_name": "...", "company_domain": "..."}`.
///
/// # Returns
///
/// * `Result<Json<PipelineSummary>, AppError>` - The result summary, or the fatal stage error.
pub async fn process_lead(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<Json<PipelineSummary>, AppError> {
    let Value::Object(fields) = payload else {
        return Err(AppError::BadRequest(
            "Lead payload must be a JSON object".to_string(),
        ));
    };

    tracing::info!("POST /leads - {} field(s)", fields.len());

    let summary = state.pipeline.process_lead(fields).await?;

    tracing::info!(
        "Lead processed: record_id={}, qualification={}, strategy={}",
        summary.record_id,
        summary.qualification_score,
        summary.strategy
    );

    Ok(Json(summary))
}

/// GET /api/v1/leads/:id
///
/// Retrieves a persisted composite record, from the cache when it is still warm.
pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CompositeRecord>, AppError> {
    tracing::info!("GET /leads/{}", id);

    let record = state.reader.fetch(id).await?;
    Ok(Json(record))
}
