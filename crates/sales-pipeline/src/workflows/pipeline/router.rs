use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::audit::AuditQuery;
use super::orchestrator::{PipelineError, PipelineOrchestrator};
use super::state::Signal;
use crate::workflows::discovery::{DiscoveryId, DiscoveryRecord};

#[derive(Debug, Deserialize)]
pub struct SignalRequest {
    pub signal: Signal,
}

#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    pub operator: String,
}

/// HTTP endpoints for scoring, quoting and driving deals through the pipeline.
pub fn pipeline_router(orchestrator: Arc<PipelineOrchestrator>) -> Router {
    Router::new()
        .route("/api/v1/qualification/score", post(score_handler))
        .route("/api/v1/pricing/quote", post(quote_handler))
        .route("/api/v1/discovery", post(submit_handler))
        .route("/api/v1/deals/:deal_id", get(deal_handler))
        .route("/api/v1/deals/:deal_id/advance", post(advance_handler))
        .route("/api/v1/deals/:deal_id/signals", post(signal_handler))
        .route("/api/v1/deals/:deal_id/resume", post(resume_handler))
        .route("/api/v1/interventions", get(interventions_handler))
        .route("/api/v1/automation-log", get(automation_log_handler))
        .route("/api/v1/analytics", get(analytics_handler))
        .with_state(orchestrator)
}

/// Status code for an orchestrator error.
pub fn status_for(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::Validation(_)
        | PipelineError::Pricing(_)
        | PipelineError::ManualInterventionRequired { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::StateConflict { .. }
        | PipelineError::NothingToAdvance { .. }
        | PipelineError::NotHalted { .. } => StatusCode::CONFLICT,
        PipelineError::UnknownDeal(_) => StatusCode::NOT_FOUND,
        PipelineError::RetriesExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        PipelineError::Storage(_)
        | PipelineError::Collaborator(_)
        | PipelineError::MissingRecord { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(error: PipelineError) -> Response {
    let payload = json!({
        "error": error.to_string(),
    });
    (status_for(&error), axum::Json(payload)).into_response()
}

pub(crate) async fn score_handler(
    State(orchestrator): State<Arc<PipelineOrchestrator>>,
    axum::Json(record): axum::Json<DiscoveryRecord>,
) -> Response {
    match orchestrator.score(&record) {
        Ok(score) => (StatusCode::OK, axum::Json(score)).into_response(),
        Err(error) => error_response(error.into()),
    }
}

pub(crate) async fn quote_handler(
    State(orchestrator): State<Arc<PipelineOrchestrator>>,
    axum::Json(record): axum::Json<DiscoveryRecord>,
) -> Response {
    match orchestrator.quote(&record) {
        Ok((score, quote)) => {
            let payload = json!({
                "score": score,
                "quote": quote,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler(
    State(orchestrator): State<Arc<PipelineOrchestrator>>,
    axum::Json(record): axum::Json<DiscoveryRecord>,
) -> Response {
    match orchestrator.submit_discovery(record).await {
        Ok(report) => (StatusCode::ACCEPTED, axum::Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn deal_handler(
    State(orchestrator): State<Arc<PipelineOrchestrator>>,
    Path(deal_id): Path<String>,
) -> Response {
    let deal_id = DiscoveryId(deal_id);
    match orchestrator.deal(&deal_id).await {
        Ok(deal) => {
            let payload = json!({
                "deal": deal,
                "history": orchestrator.deal_history(&deal_id),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn advance_handler(
    State(orchestrator): State<Arc<PipelineOrchestrator>>,
    Path(deal_id): Path<String>,
) -> Response {
    match orchestrator.advance(&DiscoveryId(deal_id)).await {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn signal_handler(
    State(orchestrator): State<Arc<PipelineOrchestrator>>,
    Path(deal_id): Path<String>,
    axum::Json(request): axum::Json<SignalRequest>,
) -> Response {
    match orchestrator
        .signal(&DiscoveryId(deal_id), request.signal)
        .await
    {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn resume_handler(
    State(orchestrator): State<Arc<PipelineOrchestrator>>,
    Path(deal_id): Path<String>,
    axum::Json(request): axum::Json<ResumeRequest>,
) -> Response {
    if request.operator.trim().is_empty() {
        let payload = json!({
            "error": "operator is required to resume a deal",
        });
        return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
    }
    match orchestrator
        .resume(&DiscoveryId(deal_id), &request.operator)
        .await
    {
        Ok(deal) => (StatusCode::OK, axum::Json(deal)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn interventions_handler(
    State(orchestrator): State<Arc<PipelineOrchestrator>>,
) -> Response {
    let interventions = orchestrator.interventions().await;
    (StatusCode::OK, axum::Json(interventions)).into_response()
}

pub(crate) async fn automation_log_handler(
    State(orchestrator): State<Arc<PipelineOrchestrator>>,
    Query(query): Query<AuditQuery>,
) -> Response {
    let entries = orchestrator.automation_log(&query);
    (StatusCode::OK, axum::Json(entries)).into_response()
}

pub(crate) async fn analytics_handler(
    State(orchestrator): State<Arc<PipelineOrchestrator>>,
) -> Response {
    let analytics = orchestrator.analytics().await;
    (StatusCode::OK, axum::Json(analytics)).into_response()
}
