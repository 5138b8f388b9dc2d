use crate::bridge::crm::CrmGateway;
use crate::bridge::identity::IdentityGateway;
use crate::bridge::intake::IntakeRecord;
use crate::bridge::scoring::ScoringGateway;
use crate::bridge::store::RecordStore;
use crate::bridge::{AssessmentOutcome, AssessmentService, ReportError};
use crate::infra::AppState;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Remediation text for callers that fail hashid validation. Returned in a
/// 200 body on purpose: auth failure here is a business outcome, not a
/// transport error.
pub const NOT_AUTHENTICATED_MSG: &str =
    "User is not authenticated. Please provide a valid hashid and try again.";

pub const RETRY_LATER_MSG: &str =
    "We are experiencing huge load at the moment. Please try again later.";

pub const GENERIC_FAILURE_MSG: &str =
    "Unable to process the assessment request. Please try again.";

pub const RECORD_NOT_FOUND_MSG: &str = "No record found for the supplied record_id.";

pub fn with_bridge_routes<S, I, G, C>(service: Arc<AssessmentService<S, I, G, C>>) -> Router
where
    S: RecordStore + 'static,
    I: IdentityGateway + 'static,
    G: ScoringGateway + 'static,
    C: CrmGateway + 'static,
{
    Router::new()
        .route("/aicvd", post(assessment_endpoint::<S, I, G, C>))
        .route("/aicvd-report", post(report_endpoint::<S, I, G, C>))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(service)
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn assessment_endpoint<S, I, G, C>(
    State(service): State<Arc<AssessmentService<S, I, G, C>>>,
    Json(intake): Json<IntakeRecord>,
) -> Response
where
    S: RecordStore + 'static,
    I: IdentityGateway + 'static,
    G: ScoringGateway + 'static,
    C: CrmGateway + 'static,
{
    match service.assess(intake).await {
        AssessmentOutcome::Unauthenticated => (
            StatusCode::OK,
            Json(json!({ "status": "not authenticated", "msg": NOT_AUTHENTICATED_MSG })),
        )
            .into_response(),
        AssessmentOutcome::Completed(done) => (
            StatusCode::OK,
            Json(json!({ "status": "success", "response": done.summary })),
        )
            .into_response(),
        AssessmentOutcome::ScoringUnavailable => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "msg": RETRY_LATER_MSG })),
        )
            .into_response(),
        AssessmentOutcome::ScoringRejected { detail } => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "error", "api_error_response": detail })),
        )
            .into_response(),
        AssessmentOutcome::Failed => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "error", "msg": GENERIC_FAILURE_MSG })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReportRequest {
    pub(crate) record_id: String,
}

async fn report_endpoint<S, I, G, C>(
    State(service): State<Arc<AssessmentService<S, I, G, C>>>,
    headers: HeaderMap,
    Json(request): Json<ReportRequest>,
) -> Response
where
    S: RecordStore + 'static,
    I: IdentityGateway + 'static,
    G: ScoringGateway + 'static,
    C: CrmGateway + 'static,
{
    let Some(credential) = bearer_token(&headers) else {
        return not_authenticated_response();
    };

    match service.report(credential, &request.record_id) {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "patient_info": report.patient_info,
                "patient_risk_data": report.patient_risk_data,
            })),
        )
            .into_response(),
        Err(ReportError::Unauthenticated) => not_authenticated_response(),
        Err(ReportError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "error", "msg": RECORD_NOT_FOUND_MSG })),
        )
            .into_response(),
        Err(err) => {
            warn!(record_id = %request.record_id, error = %err, "report retrieval failed");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "error", "msg": GENERIC_FAILURE_MSG })),
            )
                .into_response()
        }
    }
}

fn not_authenticated_response() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "status": "not authenticated", "msg": NOT_AUTHENTICATED_MSG })),
    )
        .into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
