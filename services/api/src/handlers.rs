//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests for the
//! tutoring conversation and the student read model. It uses `utoipa` doc
//! comments to generate OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use mentor_core::experts::ExpertType;
use mentor_core::student::InterviewStage;
use tracing::error;

use crate::models::{
    ErrorResponse, HealthOut, ReinterviewOut, SendMessagePayload, StudentOut, TurnResponse,
};
use crate::state::AppState;

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Send a message to one of the experts and process the turn.
#[utoipa::path(
    post,
    path = "/students/{id}/experts/{expert}/messages",
    request_body = SendMessagePayload,
    responses(
        (status = 200, description = "Turn processed", body = TurnResponse),
        (status = 400, description = "Unknown expert", body = ErrorResponse),
        (status = 500, description = "Turn failed", body = ErrorResponse)
    ),
    params(
        ("id" = i64, Path, description = "Student ID"),
        ("expert" = String, Path, description = "Persona answering this turn, e.g. 'teacher'")
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    Path((id, expert)): Path<(i64, String)>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<Json<TurnResponse>, ApiError> {
    let expert = ExpertType::parse(&expert)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown expert '{}'", expert)))?;

    let response = state.turns.process_turn(id, expert, &payload.text).await?;
    Ok(Json(TurnResponse::from(response)))
}

/// Get a student's profile and progress summary.
#[utoipa::path(
    get,
    path = "/students/{id}",
    responses(
        (status = 200, description = "Student profile", body = StudentOut),
        (status = 404, description = "Student not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = i64, Path, description = "Student ID")
    )
)]
pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<StudentOut>, ApiError> {
    let student = state
        .students
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Student with id '{}' not found", id)))?;
    Ok(Json(StudentOut::from(&student)))
}

/// Restart the profiling interview for a student.
#[utoipa::path(
    post,
    path = "/students/{id}/reinterview",
    responses(
        (status = 200, description = "Interview restarted", body = ReinterviewOut),
        (status = 404, description = "Student not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = i64, Path, description = "Student ID")
    )
)]
pub async fn trigger_reinterview(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ReinterviewOut>, ApiError> {
    // Ensure the student exists before resetting the stage.
    let _ = state
        .students
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Student with id '{}' not found", id)))?;

    state
        .students
        .set_interview_stage(id, InterviewStage::Welcome)
        .await?;

    Ok(Json(ReinterviewOut {
        student_id: id,
        interview_stage: InterviewStage::Welcome.to_string(),
    }))
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthOut))
)]
pub async fn health() -> Json<HealthOut> {
    Json(HealthOut { ok: true })
}
