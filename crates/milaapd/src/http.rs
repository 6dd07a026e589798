//! HTTP/JSON boundary for the match API.
//!
//! One route per operation; every error maps to a stable
//! `{ "error": { "code", "message" } }` body so kiosk clients can
//! distinguish "no match found" (an empty `matches` array) from failures.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use milaap_core::{FaceDescriptor, PersonRecord, PersonStatus};

use crate::service::{MatchHit, MatchService, ServiceError, SightingReport};

/// Build the router with all routes and middleware.
pub fn router(service: Arc<MatchService>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/sightings", post(report_sighting))
        .route("/api/v1/match", post(match_face))
        .route("/api/v1/persons", get(list_persons))
        .route("/api/v1/persons/{id}/status", post(transition_status))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Error wrapper carrying the HTTP mapping for [`ServiceError`].
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            ServiceError::InvalidDescriptor(_) => StatusCode::BAD_REQUEST,
            ServiceError::InvalidTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::ConcurrentModification(_) => StatusCode::CONFLICT,
            ServiceError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_code(&self) -> &'static str {
        match &self.0 {
            ServiceError::InvalidDescriptor(_) => "INVALID_DESCRIPTOR",
            ServiceError::InvalidTransition(_) => "INVALID_TRANSITION",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            ServiceError::Store(_) => "STORE_UNAVAILABLE",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.0.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize)]
struct ReportSightingRequest {
    face_descriptor: Vec<f32>,
    #[serde(flatten)]
    report: SightingReport,
}

async fn report_sighting(
    State(service): State<Arc<MatchService>>,
    Json(request): Json<ReportSightingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let descriptor =
        FaceDescriptor::new(request.face_descriptor).map_err(ServiceError::from)?;
    let record = service.report_sighting(descriptor, request.report).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Debug, Deserialize)]
struct MatchRequest {
    face_descriptor: Vec<f32>,
    #[serde(default)]
    status_filter: Option<PersonStatus>,
    #[serde(default)]
    max_distance: Option<f32>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct MatchResponse {
    matches: Vec<MatchHit>,
}

async fn match_face(
    State(service): State<Arc<MatchService>>,
    Json(request): Json<MatchRequest>,
) -> Result<Json<MatchResponse>, ApiError> {
    // Reject malformed descriptors before any candidate is fetched.
    let descriptor =
        FaceDescriptor::new(request.face_descriptor).map_err(ServiceError::from)?;
    let matches = service
        .match_face(
            descriptor,
            request.status_filter,
            request.max_distance,
            request.limit,
        )
        .await?;
    Ok(Json(MatchResponse { matches }))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    status: Option<PersonStatus>,
}

#[derive(Debug, Serialize)]
struct PersonsResponse {
    persons: Vec<PersonRecord>,
}

async fn list_persons(
    State(service): State<Arc<MatchService>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PersonsResponse>, ApiError> {
    let persons = service.list_by_status(query.status).await?;
    Ok(Json(PersonsResponse { persons }))
}

#[derive(Debug, Deserialize)]
struct TransitionRequest {
    status: PersonStatus,
    #[serde(default)]
    current_location: Option<String>,
}

async fn transition_status(
    State(service): State<Arc<MatchService>>,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<PersonRecord>, ApiError> {
    let record = service
        .transition_status(id, request.status, request.current_location)
        .await?;
    Ok(Json(record))
}
