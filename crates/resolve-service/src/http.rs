//! HTTP front end.
//!
//! | Route | |
//! |---|---|
//! | `GET /health` | liveness plus backend degradation levels |
//! | `POST /api/v1/tickets` | process one ticket, returns its log |
//! | `POST /api/v1/tickets/batch` | process many tickets, returns their logs |
//! | `GET /api/v1/metrics` | aggregator snapshot and learning performance |
//! | `POST /api/v1/feedback` | record resolution feedback |

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use coordination::agents::{Feedback, FeedbackReceipt, LearningPerformance};
use coordination::analytics::MetricsSnapshot;
use coordination::pipeline::ProcessingLog;
use coordination::resilience::DegradationLevel;
use coordination::ticket::Ticket;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::app::Pipeline;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub completion: DegradationLevel,
    pub search: DegradationLevel,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub pipeline: MetricsSnapshot,
    pub learning: LearningPerformance,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Error returned by a handler.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(error) => (StatusCode::BAD_REQUEST, error),
            ApiError::Unavailable(error) => (StatusCode::SERVICE_UNAVAILABLE, error),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/tickets", post(process_ticket))
        .route("/api/v1/tickets/batch", post(process_batch))
        .route("/api/v1/metrics", get(metrics))
        .route("/api/v1/feedback", post(submit_feedback))
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline)
}

async fn health(State(pipeline): State<Arc<Pipeline>>) -> Json<HealthResponse> {
    let health = pipeline.coordinator.backend_health();
    let level = |i: usize| {
        health
            .get(i)
            .map(|h| h.level)
            .unwrap_or(DegradationLevel::Unavailable)
    };
    let (completion, search) = (level(0), level(1));
    let status = if completion == DegradationLevel::Full && search == DegradationLevel::Full {
        "healthy"
    } else {
        "degraded"
    };
    Json(HealthResponse {
        status,
        completion,
        search,
    })
}

async fn process_ticket(
    State(pipeline): State<Arc<Pipeline>>,
    Json(ticket): Json<Ticket>,
) -> Result<Json<ProcessingLog>, ApiError> {
    ticket
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    info!(ticket_id = %ticket.id, "Ticket received");
    Ok(Json(pipeline.process(&ticket).await))
}

async fn process_batch(
    State(pipeline): State<Arc<Pipeline>>,
    Json(tickets): Json<Vec<Ticket>>,
) -> Result<Json<Vec<ProcessingLog>>, ApiError> {
    for ticket in &tickets {
        ticket
            .validate()
            .map_err(|e| ApiError::BadRequest(format!("{}: {e}", ticket.id)))?;
    }
    info!(count = tickets.len(), "Batch received");
    Ok(Json(pipeline.process_batch(tickets).await))
}

async fn metrics(
    State(pipeline): State<Arc<Pipeline>>,
) -> Result<Json<MetricsResponse>, ApiError> {
    let snapshot = pipeline.metrics.snapshot().await.map_err(|e| {
        warn!(error = %e, "Metrics snapshot failed");
        ApiError::Unavailable(e.to_string())
    })?;
    Ok(Json(MetricsResponse {
        pipeline: snapshot,
        learning: pipeline.learning.performance(),
    }))
}

async fn submit_feedback(
    State(pipeline): State<Arc<Pipeline>>,
    Json(feedback): Json<Feedback>,
) -> Result<Json<FeedbackReceipt>, ApiError> {
    if feedback.ticket_id.trim().is_empty() {
        return Err(ApiError::BadRequest("ticket_id must not be empty".into()));
    }
    if !(1..=5).contains(&feedback.user_satisfaction) {
        return Err(ApiError::BadRequest(
            "user_satisfaction must be between 1 and 5".into(),
        ));
    }
    Ok(Json(pipeline.learning.record_feedback(feedback)))
}
